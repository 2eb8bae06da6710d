//! # shop-supabase
//!
//! Supabase collaborators for storefront-rs.
//!
//! This crate implements two of the `shop-core` seams:
//!
//! - **SupabaseStore** (`DataStore`) - typed, table-scoped reads and
//!   writes over the PostgREST API for the products, orders,
//!   order_items, and customers tables
//! - **SupabaseAuth** (`AuthProvider`) - bearer-token resolution and
//!   password sign-in/sign-up/sign-out over the GoTrue API
//!
//! Every response is validated into a typed record at this boundary;
//! a shape mismatch surfaces as `ShopError::Serialization` or
//! `ShopError::Upstream`, never as untyped JSON flowing inward.

pub mod auth;
pub mod config;
pub mod rest;

// Re-exports
pub use auth::SupabaseAuth;
pub use config::SupabaseConfig;
pub use rest::SupabaseStore;
