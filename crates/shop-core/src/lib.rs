//! # shop-core
//!
//! Core types and traits for the storefront service.
//!
//! This crate provides:
//! - `Cart` and `CartStorage` for the cart state container
//! - `Product`, `Order`, `OrderItem`, and `PaymentSession` records
//! - `AuthProvider`, `DataStore`, and `PaymentsProvider` collaborator traits
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{Cart, CartEntry};
//!
//! let mut cart = Cart::new();
//! cart.add_item(CartEntry {
//!     id: "1".into(),
//!     name: "Widget".into(),
//!     price: 14.99,
//!     image: None,
//! });
//! assert_eq!(cart.total_items(), 1);
//! ```

pub mod auth;
pub mod cart;
pub mod error;
pub mod model;
pub mod money;
pub mod payments;
pub mod store;

// Re-exports for convenience
pub use auth::{AuthProvider, AuthSession, BoxedAuthProvider, Credentials};
pub use cart::{Cart, CartEntry, CartItem, CartState, CartStorage, JsonFileStorage, MemoryStorage};
pub use error::{ShopError, ShopResult};
pub use model::{
    AuthUser, CustomerRecord, NewOrder, NewOrderItem, Order, OrderItemDetail, PaymentSession,
    Product, ProductSnapshot, SessionLineItem,
};
pub use payments::{
    BoxedPaymentsProvider, CheckoutLineItem, CreateSessionRequest, CreatedSession,
    PaymentsProvider,
};
pub use store::{BoxedDataStore, DataStore};
