//! # shop-stripe
//!
//! Stripe payments collaborator for storefront-rs.
//!
//! Implements the `PaymentsProvider` trait from `shop-core` against the
//! Stripe REST API:
//!
//! - Customer creation (tagged with the storefront user id)
//! - Checkout Session creation (hosted checkout page, card payments,
//!   one-time mode)
//! - Session retrieval with `line_items` and `customer` expanded
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeClient;
//! use shop_core::PaymentsProvider;
//!
//! let client = StripeClient::from_env()?;
//! let created = client.create_checkout_session(&request).await?;
//! // Respond with created.session_id; the frontend redirects.
//! ```

pub mod client;
pub mod config;

// Re-exports
pub use client::StripeClient;
pub use config::StripeConfig;
