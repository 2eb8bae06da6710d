//! # Payments Collaborator
//!
//! Trait seam over the hosted payments platform: customer records,
//! checkout-session creation, and session retrieval with expansion.

use crate::error::ShopResult;
use crate::model::PaymentSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A line item for session creation, already priced in minor units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Integer minor currency units, `round(price * 100)`
    pub unit_amount: i64,
    pub quantity: u32,
}

impl CheckoutLineItem {
    /// `unit_amount x quantity`, in minor units
    pub fn amount_total(&self) -> i64 {
        self.unit_amount * self.quantity as i64
    }
}

/// A request to create a hosted checkout session.
///
/// Payment method type is fixed to "card" and mode to "payment";
/// implementations hard-code both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Stripe customer id to attach the session to
    pub customer_id: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Stamped onto the session; includes `user_id` for later
    /// authorization of session lookups
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A freshly created session: the id the caller redirects with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Payments provider seam
#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    /// Create a customer record on the platform, tagged with the user id
    async fn create_customer(&self, email: Option<&str>, user_id: &str) -> ShopResult<String>;

    /// Create a hosted checkout session
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> ShopResult<CreatedSession>;

    /// Retrieve a session with line items and customer expanded
    async fn retrieve_session(&self, session_id: &str) -> ShopResult<PaymentSession>;

    /// Provider name, for logging
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payments provider (dynamic dispatch)
pub type BoxedPaymentsProvider = Arc<dyn PaymentsProvider>;
