//! # Stripe Client
//!
//! Implementation of the payments collaborator against the Stripe REST
//! API: customer creation, Checkout Session creation, and session
//! retrieval with nested expansion. Responses are validated into the
//! typed records from `shop-core` at this boundary.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shop_core::{
    CreateSessionRequest, CreatedSession, PaymentSession, PaymentsProvider, SessionLineItem,
    ShopError, ShopResult,
};
use tracing::{debug, error, info, instrument};

/// Stripe payments collaborator
///
/// Uses Stripe's hosted checkout page; card payments only, one-time
/// payment mode.
pub struct StripeClient {
    config: StripeConfig,
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Flatten a session request into Stripe's bracketed form encoding
    fn build_form_params(request: &CreateSessionRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("customer".to_string(), request.customer_id.clone()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            form_params.push((
                format!("line_items[{}][price_data][currency]", i),
                "usd".to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount.to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            if let Some(ref desc) = item.description {
                form_params.push((
                    format!("line_items[{}][price_data][product_data][description]", i),
                    desc.clone(),
                ));
            }
            if let Some(ref img) = item.image_url {
                form_params.push((
                    format!("line_items[{}][price_data][product_data][images][0]", i),
                    img.clone(),
                ));
            }
            form_params.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }

        for (key, value) in &request.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        form_params
    }

    /// POST a form to the Stripe API and return the successful body
    async fn post_form(&self, path: &str, form_params: &[(String, String)]) -> ShopResult<String> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(form_params)
            .send()
            .await
            .map_err(|e| ShopError::upstream("stripe", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("stripe", e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(ShopError::upstream("stripe", error_response.error.message));
            }

            return Err(ShopError::upstream(
                "stripe",
                format!("HTTP {}: {}", status, body),
            ));
        }

        Ok(body)
    }
}

#[async_trait]
impl PaymentsProvider for StripeClient {
    #[instrument(skip(self, email))]
    async fn create_customer(&self, email: Option<&str>, user_id: &str) -> ShopResult<String> {
        let mut form_params: Vec<(String, String)> =
            vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            form_params.push(("email".to_string(), email.to_string()));
        }

        let body = self.post_form("/v1/customers", &form_params).await?;

        let customer: StripeCustomerResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe customer: {}", e))
        })?;

        info!("Created Stripe customer: id={}", customer.id);
        Ok(customer.id)
    }

    #[instrument(skip(self, request), fields(items = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> ShopResult<CreatedSession> {
        if request.line_items.is_empty() {
            return Err(ShopError::InvalidRequest(
                "Checkout session has no line items".to_string(),
            ));
        }

        let form_params = Self::build_form_params(request);

        debug!(
            "Creating Stripe checkout session: {} items, customer={}",
            request.line_items.len(),
            request.customer_id
        );

        let body = self.post_form("/v1/checkout/sessions", &form_params).await?;

        let session: StripeSessionResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe session: {}", e))
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(CreatedSession {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> ShopResult<PaymentSession> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("expand[]", "line_items.data.price.product"),
                ("expand[]", "customer"),
            ])
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| ShopError::upstream("stripe", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("stripe", e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShopError::NotFound(format!("session {}", session_id)));
        }

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(ShopError::upstream(
                "stripe",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let session: StripeSessionResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe session: {}", e))
        })?;

        Ok(session.into_payment_session())
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCustomerResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    customer: Option<StripeCustomerField>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    line_items: Option<StripeList<StripeLineItemResponse>>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

impl StripeSessionResponse {
    fn into_payment_session(self) -> PaymentSession {
        PaymentSession {
            id: self.id,
            payment_status: self.payment_status,
            status: self.status,
            amount_total: self.amount_total,
            currency: self.currency,
            customer: self.customer.map(|c| c.id()),
            created: self.created,
            line_items: self
                .line_items
                .map(|list| {
                    list.data
                        .into_iter()
                        .map(|item| SessionLineItem {
                            id: item.id,
                            description: item.description,
                            quantity: item.quantity,
                            amount_total: item.amount_total,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            metadata: self.metadata,
        }
    }
}

/// Expanded resources come back as objects, plain references as ids
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StripeCustomerField {
    Id(String),
    Expanded { id: String },
}

impl StripeCustomerField {
    fn id(self) -> String {
        match self {
            StripeCustomerField::Id(id) => id,
            StripeCustomerField::Expanded { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeLineItemResponse {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    amount_total: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_core::CheckoutLineItem;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> StripeClient {
        let config =
            StripeConfig::new("sk_test_abc", "pk_test_xyz").with_api_base_url(base_url);
        StripeClient::new(config)
    }

    fn session_request() -> CreateSessionRequest {
        CreateSessionRequest {
            customer_id: "cus_123".into(),
            line_items: vec![CheckoutLineItem {
                name: "Widget".into(),
                description: Some("A widget".into()),
                image_url: None,
                unit_amount: 1499,
                quantity: 2,
            }],
            success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "https://shop.test/cart".into(),
            metadata: [("user_id".to_string(), "user-1".to_string())]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_build_form_params() {
        let params = StripeClient::build_form_params(&session_request());

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(get("customer"), Some("cus_123"));
        assert_eq!(
            get("line_items[0][price_data][unit_amount]"),
            Some("1499")
        );
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("metadata[user_id]"), Some("user-1"));
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
                "url": "https://checkout.stripe.com/c/pay/cs_test_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let created = client
            .create_checkout_session(&session_request())
            .await
            .unwrap();

        assert_eq!(created.session_id, "cs_test_abc");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("mode=payment"));
        assert!(body.contains("1499"));
    }

    #[tokio::test]
    async fn test_create_checkout_session_empty_items() {
        let client = test_client("http://127.0.0.1:1");
        let mut request = session_request();
        request.line_items.clear();

        let err = client.create_checkout_session(&request).await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_create_customer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cus_new",
                "email": "a@b.test"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id = client
            .create_customer(Some("a@b.test"), "user-1")
            .await
            .unwrap();
        assert_eq!(id, "cus_new");
    }

    #[tokio::test]
    async fn test_retrieve_session_maps_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
                "payment_status": "paid",
                "status": "complete",
                "amount_total": 2998,
                "currency": "usd",
                "customer": {"id": "cus_123", "email": "a@b.test"},
                "created": 1700000000,
                "line_items": {
                    "object": "list",
                    "data": [
                        {"id": "li_1", "description": "Widget", "quantity": 2, "amount_total": 2998}
                    ]
                },
                "metadata": {"user_id": "user-1"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let session = client.retrieve_session("cs_test_abc").await.unwrap();

        assert_eq!(session.payment_status.as_deref(), Some("paid"));
        assert_eq!(session.amount_total, Some(2998));
        assert_eq!(session.customer.as_deref(), Some("cus_123"));
        assert_eq!(session.line_items.len(), 1);
        assert_eq!(session.metadata_user_id(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_retrieve_session_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"message": "No such checkout.session: 'cs_missing'"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.retrieve_session("cs_missing").await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Invalid currency"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_checkout_session(&session_request())
            .await
            .unwrap_err();

        match err {
            ShopError::Upstream { source_name, message } => {
                assert_eq!(source_name, "stripe");
                assert_eq!(message, "Invalid currency");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }
}
