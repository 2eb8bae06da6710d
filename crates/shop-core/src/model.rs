//! # Domain Records
//!
//! Typed records for the four persisted tables (products, orders,
//! order_items, customers) and the authoritative payment session.
//! External responses are validated into these shapes at the boundary;
//! untyped JSON never flows inward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product row from the catalog table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Decimal price; converted to minor units at checkout time
    pub price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub inventory: Option<i64>,
    #[serde(default)]
    pub stripe_product_id: Option<String>,
    #[serde(default)]
    pub stripe_price_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A persisted order row. A shadow of the authoritative payment
/// session, not its source of truth. Shipping address columns are
/// filled in out-of-band after payment and stay `None` until then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// "pending" at creation; advanced out-of-band
    pub status: String,
    /// Locally computed from rounded minor-unit line items
    pub total: f64,
    pub stripe_checkout_id: String,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a new order (id and timestamp are assigned by
/// the store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: String,
    pub status: String,
    pub total: f64,
    pub stripe_checkout_id: String,
}

/// A persisted order line. `price_at_purchase` snapshots the unrounded
/// product price at purchase time and is never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price_at_purchase: f64,
}

/// An order line joined with product snapshot fields, as returned by
/// the order-detail query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDetail {
    pub id: String,
    pub quantity: u32,
    #[serde(default)]
    pub price_at_purchase: Option<f64>,
    #[serde(default)]
    pub product: Option<ProductSnapshot>,
}

/// The product fields exposed on an order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Mapping from a user to their Stripe customer, persisted on first
/// checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// The user id (primary key; same as the auth identity)
    pub id: String,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An authenticated identity as reported by the auth collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The authoritative checkout session, owned by the payments platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Total in minor currency units
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Stripe customer id (present when expanded or set at creation)
    #[serde(default)]
    pub customer: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub line_items: Vec<SessionLineItem>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl PaymentSession {
    /// The `user_id` stamped into session metadata at creation time
    pub fn metadata_user_id(&self) -> Option<&str> {
        self.metadata.get("user_id").map(|s| s.as_str())
    }

    /// Creation time as a UTC timestamp, when the platform reported one
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// An expanded line item on a payment session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}
