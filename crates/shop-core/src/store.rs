//! # Data-Store Collaborator
//!
//! Typed, table-scoped operations over the four persisted tables:
//! products, orders, order_items, customers. Implementations translate
//! these into filtered queries (`in`, `eq`, `single`) against the
//! hosted store and validate every response shape at the boundary.

use crate::error::ShopResult;
use crate::model::{
    CustomerRecord, NewOrder, NewOrderItem, Order, OrderItemDetail, Product,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Data-store seam
#[async_trait]
pub trait DataStore: Send + Sync {
    /// All products, for catalog listing
    async fn list_products(&self) -> ShopResult<Vec<Product>>;

    /// Single product by id; `Ok(None)` when the row does not exist
    async fn product_by_id(&self, product_id: &str) -> ShopResult<Option<Product>>;

    /// Batched lookup: `id IN (…)`. Unknown ids are simply absent from
    /// the result; callers decide whether that is fatal.
    async fn products_by_ids(&self, product_ids: &[String]) -> ShopResult<Vec<Product>>;

    /// The user -> Stripe customer mapping, when one was persisted
    async fn customer_for_user(&self, user_id: &str) -> ShopResult<Option<CustomerRecord>>;

    /// Persist a new user -> Stripe customer mapping
    async fn insert_customer(&self, record: &CustomerRecord) -> ShopResult<()>;

    /// Insert an order row and return it with its assigned id
    async fn insert_order(&self, order: &NewOrder) -> ShopResult<Order>;

    /// Insert the order lines for an order
    async fn insert_order_items(&self, items: &[NewOrderItem]) -> ShopResult<()>;

    /// Order by its own id, any user. `Ok(None)` on row-not-found;
    /// ownership is the caller's check.
    async fn order_by_id(&self, order_id: &str) -> ShopResult<Option<Order>>;

    /// Order by checkout-session id, any user. `Ok(None)` on row-not-found.
    async fn order_by_session(&self, session_id: &str) -> ShopResult<Option<Order>>;

    /// Order by checkout-session id, scoped to one user
    async fn order_by_session_for_user(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ShopResult<Option<Order>>;

    /// Order lines joined with product snapshot fields
    async fn order_items_for_order(&self, order_id: &str) -> ShopResult<Vec<OrderItemDetail>>;
}

/// Type alias for a shared data store (dynamic dispatch)
pub type BoxedDataStore = Arc<dyn DataStore>;
