//! # Supabase Data Store
//!
//! Implementation of the data-store collaborator against the PostgREST
//! API. Table-scoped requests with `in`/`eq` filters; single-row reads
//! use PostgREST's object representation, which turns zero rows into a
//! 406 that maps to `Ok(None)` rather than an error.

use crate::config::SupabaseConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shop_core::{
    CustomerRecord, DataStore, NewOrder, NewOrderItem, Order, OrderItemDetail, Product, ShopError,
    ShopResult,
};
use tracing::{debug, error, instrument};

/// Media type that makes PostgREST return a single object instead of
/// a one-element array
const PGRST_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Supabase-backed data store
pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStore {
    /// Create a new store
    pub fn new(config: SupabaseConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        let config = SupabaseConfig::from_env()?;
        Ok(Self::new(config))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.config.rest_base(), table)
    }

    /// GET a filtered row set
    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> ShopResult<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(query)
            .header("apikey", self.config.table_key())
            .header("Authorization", format!("Bearer {}", self.config.table_key()))
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        if !status.is_success() {
            error!("PostgREST error: table={}, status={}, body={}", table, status, body);
            return Err(ShopError::upstream(
                "supabase",
                format!("{} HTTP {}", table, status),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("{} rows: {}", table, e)))
    }

    /// GET a single row; `Ok(None)` when no row matches
    async fn get_single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> ShopResult<Option<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(query)
            .header("apikey", self.config.table_key())
            .header("Authorization", format!("Bearer {}", self.config.table_key()))
            .header("Accept", PGRST_OBJECT)
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        let status = response.status();

        // Zero (or more than one) rows under the object media type
        if status == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        if !status.is_success() {
            error!("PostgREST error: table={}, status={}, body={}", table, status, body);
            return Err(ShopError::upstream(
                "supabase",
                format!("{} HTTP {}", table, status),
            ));
        }

        let row = serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("{} row: {}", table, e)))?;
        Ok(Some(row))
    }

    /// POST a row and return the stored representation
    async fn insert_returning<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> ShopResult<T> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", self.config.table_key())
            .header("Authorization", format!("Bearer {}", self.config.table_key()))
            .header("Prefer", "return=representation")
            .header("Accept", PGRST_OBJECT)
            .json(body)
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        if !status.is_success() {
            error!("PostgREST insert error: table={}, status={}, body={}", table, status, body);
            return Err(ShopError::upstream(
                "supabase",
                format!("{} insert HTTP {}", table, status),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("{} insert: {}", table, e)))
    }

    /// POST rows without asking for the representation back
    async fn insert_minimal<B: Serialize>(&self, table: &str, body: &B) -> ShopResult<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", self.config.table_key())
            .header("Authorization", format!("Bearer {}", self.config.table_key()))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("PostgREST insert error: table={}, status={}, body={}", table, status, body);
            return Err(ShopError::upstream(
                "supabase",
                format!("{} insert HTTP {}", table, status),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl DataStore for SupabaseStore {
    #[instrument(skip(self))]
    async fn list_products(&self) -> ShopResult<Vec<Product>> {
        self.get_rows("products", &[("select", "*".to_string())])
            .await
    }

    #[instrument(skip(self))]
    async fn product_by_id(&self, product_id: &str) -> ShopResult<Option<Product>> {
        self.get_single(
            "products",
            &[
                ("id", format!("eq.{product_id}")),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self), fields(count = product_ids.len()))]
    async fn products_by_ids(&self, product_ids: &[String]) -> ShopResult<Vec<Product>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Batched product lookup: {} ids", product_ids.len());
        self.get_rows(
            "products",
            &[
                ("id", format!("in.({})", product_ids.join(","))),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    async fn customer_for_user(&self, user_id: &str) -> ShopResult<Option<CustomerRecord>> {
        self.get_single(
            "customers",
            &[
                ("id", format!("eq.{user_id}")),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    async fn insert_customer(&self, record: &CustomerRecord) -> ShopResult<()> {
        self.insert_minimal(
            "customers",
            &serde_json::json!({
                "id": record.id,
                "stripe_customer_id": record.stripe_customer_id,
            }),
        )
        .await
    }

    #[instrument(skip(self, order), fields(session_id = %order.stripe_checkout_id))]
    async fn insert_order(&self, order: &NewOrder) -> ShopResult<Order> {
        self.insert_returning("orders", order).await
    }

    async fn insert_order_items(&self, items: &[NewOrderItem]) -> ShopResult<()> {
        self.insert_minimal("order_items", &items).await
    }

    async fn order_by_id(&self, order_id: &str) -> ShopResult<Option<Order>> {
        self.get_single(
            "orders",
            &[
                ("id", format!("eq.{order_id}")),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    async fn order_by_session(&self, session_id: &str) -> ShopResult<Option<Order>> {
        self.get_single(
            "orders",
            &[
                ("stripe_checkout_id", format!("eq.{session_id}")),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    async fn order_by_session_for_user(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ShopResult<Option<Order>> {
        self.get_single(
            "orders",
            &[
                ("stripe_checkout_id", format!("eq.{session_id}")),
                ("user_id", format!("eq.{user_id}")),
                ("select", "*".to_string()),
            ],
        )
        .await
    }

    async fn order_items_for_order(&self, order_id: &str) -> ShopResult<Vec<OrderItemDetail>> {
        self.get_rows(
            "order_items",
            &[
                ("order_id", format!("eq.{order_id}")),
                (
                    "select",
                    "id,quantity,price_at_purchase,product:product_id(id,name,description,image_url)"
                        .to_string(),
                ),
            ],
        )
        .await
    }
}
