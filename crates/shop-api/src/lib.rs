//! # Storefront API
//!
//! HTTP server for the storefront: checkout session creation, order
//! queries, catalog reads, and auth pass-through, wired to Supabase
//! and Stripe through the `shop-core` collaborator traits.

pub mod guard;
pub mod handlers;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
