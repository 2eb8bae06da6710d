//! # Request Handlers
//!
//! Axum request handlers for the storefront API: checkout, order
//! queries, catalog reads, and auth pass-through. Handlers validate
//! input, call a collaborator, and shape the JSON response; upstream
//! failures are logged here and translated to generic messages.

use crate::reconcile::{PendingItem, ReconcileJob};
use crate::state::{AppConfig, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use shop_core::{
    money, AuthUser, CheckoutLineItem, CreateSessionRequest, Credentials, CustomerRecord,
    NewOrder, NewOrderItem, Order, OrderItemDetail, SessionLineItem, ShopError,
};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Checkout request body
#[derive(Debug, serde::Deserialize)]
pub struct CheckoutRequest {
    /// Items to purchase
    #[serde(default)]
    pub items: Vec<CheckoutRequestItem>,
}

/// Item in a checkout request
#[derive(Debug, serde::Deserialize)]
pub struct CheckoutRequestItem {
    /// Product ID
    pub id: String,
    /// Quantity, taken verbatim (no server-side upper bound or stock check)
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Checkout response: the session id the frontend redirects with
#[derive(Debug, serde::Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Union of the authoritative session and the local order shadow
#[derive(Debug, serde::Serialize)]
pub struct SessionSummaryResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub customer: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub items: Vec<SessionLineItem>,
}

/// Order detail response
#[derive(Debug, serde::Serialize)]
pub struct OrderResponse {
    pub order: OrderView,
}

/// A caller-facing order: either the local row with its lines, or a
/// minimal view built from the payments platform's session
#[derive(Debug, serde::Serialize)]
pub struct OrderView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub status: String,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_checkout_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub items: Vec<OrderItemDetail>,
}

impl OrderView {
    /// A local order row with its joined lines
    fn from_order(order: Order, items: Vec<OrderItemDetail>) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at.map(|t| t.to_rfc3339()),
            status: order.status,
            total: order.total,
            stripe_checkout_id: Some(order.stripe_checkout_id),
            address_line1: order.address_line1,
            address_line2: order.address_line2,
            city: order.city,
            state: order.state,
            postal_code: order.postal_code,
            country: order.country,
            items,
        }
    }
}

/// Error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

/// Log the full error, hand the caller the generic message
fn error_response(err: ShopError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    if code >= 500 {
        error!("Handler error: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse::new(err.public_message(), code)),
    )
}

// =============================================================================
// Auth & Request Helpers
// =============================================================================

/// Extract the bearer token from the Authorization header, falling back
/// to the `sb-access-token` session cookie.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let cookies = headers.get("cookie").and_then(|v| v.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "sb-access-token").then(|| value.to_string())
    })
}

/// Resolve the authenticated caller or fail with 401. No other lookup
/// happens before this check.
async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthUser, (StatusCode, Json<ErrorResponse>)> {
    let token = bearer_token(headers)
        .ok_or_else(|| error_response(ShopError::Unauthorized("no session token".to_string())))?;

    match state.auth.get_user(&token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error_response(ShopError::Unauthorized(
            "invalid session token".to_string(),
        ))),
        Err(e) => Err(error_response(e)),
    }
}

/// Origin for success/cancel URLs: the request's Origin header when
/// present, otherwise the configured base URL.
fn request_origin(headers: &HeaderMap, config: &AppConfig) -> String {
    headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| config.base_url.trim_end_matches('/').to_string())
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a checkout session from the caller's cart items.
///
/// Order of checks is fixed: auth, then input validation, then the
/// batched product lookup. Once the payment session exists, local
/// bookkeeping failures defer to the reconciliation queue instead of
/// failing the response.
#[instrument(skip(state, headers, request), fields(items = request.items.len()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&state, &headers).await?;

    if request.items.is_empty() {
        return Err(error_response(ShopError::InvalidRequest(
            "no items in cart".to_string(),
        )));
    }

    // One batched lookup for all requested products
    let product_ids: Vec<String> = request.items.iter().map(|i| i.id.clone()).collect();
    let products = state
        .store
        .products_by_ids(&product_ids)
        .await
        .map_err(error_response)?;

    if products.is_empty() {
        return Err(error_response(ShopError::upstream(
            "supabase",
            "product lookup returned no rows",
        )));
    }

    let customer_id = resolve_customer(&state, &user).await?;

    let mut line_items = Vec::with_capacity(request.items.len());
    let mut pending_items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = products.iter().find(|p| p.id == item.id).ok_or_else(|| {
            error_response(ShopError::upstream(
                "supabase",
                format!("product missing from lookup: {}", item.id),
            ))
        })?;

        line_items.push(CheckoutLineItem {
            name: product.name.clone(),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
            unit_amount: money::to_minor_units(product.price),
            quantity: item.quantity,
        });

        // Snapshot of the unrounded price; the order total below is built
        // from rounded minor units, so the two can differ by fractions of
        // a cent for non-integer-cent prices. Intentional, see DESIGN.md.
        pending_items.push(PendingItem {
            product_id: product.id.clone(),
            quantity: item.quantity,
            price_at_purchase: product.price,
        });
    }

    let origin = request_origin(&headers, &state.config);
    let session_request = CreateSessionRequest {
        customer_id,
        line_items: line_items.clone(),
        success_url: format!("{origin}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{origin}/cart"),
        metadata: [("user_id".to_string(), user.id.clone())]
            .into_iter()
            .collect(),
    };

    let created = state
        .payments
        .create_checkout_session(&session_request)
        .await
        .map_err(error_response)?;

    info!(
        "Created checkout session: id={}, user={}, items={}",
        created.session_id,
        user.id,
        line_items.len()
    );

    let total = money::order_total(line_items.iter().map(|li| (li.unit_amount, li.quantity)));
    let order = NewOrder {
        user_id: user.id.clone(),
        status: "pending".to_string(),
        total,
        stripe_checkout_id: created.session_id.clone(),
    };

    persist_order(&state, &created.session_id, order, pending_items).await;

    Ok(Json(CheckoutResponse {
        session_id: created.session_id,
    }))
}

/// Resolve the user's Stripe customer, creating and persisting the
/// mapping on first use. Idempotent from the second call onward since
/// the mapping is looked up before creation.
async fn resolve_customer(
    state: &AppState,
    user: &AuthUser,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    match state.store.customer_for_user(&user.id).await {
        Ok(Some(CustomerRecord {
            stripe_customer_id: Some(id),
            ..
        })) => return Ok(id),
        Ok(_) => {}
        Err(e) => {
            warn!("Customer mapping lookup failed, creating fresh customer: {}", e);
        }
    }

    let customer_id = state
        .payments
        .create_customer(user.email.as_deref(), &user.id)
        .await
        .map_err(error_response)?;

    if let Err(e) = state
        .store
        .insert_customer(&CustomerRecord {
            id: user.id.clone(),
            stripe_customer_id: Some(customer_id.clone()),
            created_at: None,
        })
        .await
    {
        warn!(
            "Failed to persist customer mapping for user {}: {}",
            user.id, e
        );
    }

    Ok(customer_id)
}

/// Best-effort order bookkeeping after the session exists. Failures go
/// to the reconciliation queue, never back to the caller.
async fn persist_order(
    state: &AppState,
    session_id: &str,
    order: NewOrder,
    items: Vec<PendingItem>,
) {
    match state.store.insert_order(&order).await {
        Ok(stored) => {
            let rows: Vec<NewOrderItem> = items
                .iter()
                .map(|item| NewOrderItem {
                    order_id: stored.id.clone(),
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    price_at_purchase: item.price_at_purchase,
                })
                .collect();

            if let Err(e) = state.store.insert_order_items(&rows).await {
                error!(
                    "Failed to persist order items for session {}: {}",
                    session_id, e
                );
                state.reconcile.enqueue(ReconcileJob::Items {
                    session_id: session_id.to_string(),
                    order_id: stored.id,
                    items: rows,
                });
            }
        }
        Err(e) => {
            error!("Failed to persist order for session {}: {}", session_id, e);
            state.reconcile.enqueue(ReconcileJob::Order {
                session_id: session_id.to_string(),
                order,
                items,
            });
        }
    }
}

/// Session summary: the authoritative session joined with the local
/// order shadow, tolerating a missing local row.
#[instrument(skip(state, headers, params))]
pub async fn get_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SessionSummaryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session_id = params
        .get("sessionId")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            error_response(ShopError::InvalidRequest("sessionId is required".to_string()))
        })?
        .clone();

    require_user(&state, &headers).await?;

    let session = state
        .payments
        .retrieve_session(&session_id)
        .await
        .map_err(error_response)?;

    // Row-not-found (or any local read failure) is not fatal here; the
    // session is the source of truth
    let order = match state.store.order_by_session(&session_id).await {
        Ok(order) => order,
        Err(e) => {
            error!("Error fetching order for session {}: {}", session_id, e);
            None
        }
    };

    Ok(Json(SessionSummaryResponse {
        session_id: session.id,
        order_id: order.map(|o| o.id),
        customer: session.customer,
        amount_total: session.amount_total,
        payment_status: session.payment_status,
        status: session.status,
        items: session.line_items,
    }))
}

/// Order detail by session id, scoped to the caller. Falls back to the
/// payments platform when no local row exists, authorizing via the
/// session's `user_id` metadata.
#[instrument(skip(state, headers, params))]
pub async fn get_order_by_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&state, &headers).await?;

    let session_id = params
        .get("session_id")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            error_response(ShopError::InvalidRequest("session_id is required".to_string()))
        })?
        .clone();

    let local = match state
        .store
        .order_by_session_for_user(&session_id, &user.id)
        .await
    {
        Ok(order) => order,
        Err(e) => {
            error!("Error fetching order for session {}: {}", session_id, e);
            None
        }
    };

    let Some(order) = local else {
        let session = match state.payments.retrieve_session(&session_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    "Error fetching session {} from payments platform: {}",
                    session_id, e
                );
                return Err(error_response(ShopError::NotFound("order".to_string())));
            }
        };

        if session.metadata_user_id() != Some(user.id.as_str()) {
            return Err(error_response(ShopError::Forbidden(
                "order belongs to another user".to_string(),
            )));
        }

        return Ok(Json(OrderResponse {
            order: OrderView {
                id: session.id.clone(),
                created_at: session.created_at().map(|t| t.to_rfc3339()),
                status: session
                    .payment_status
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                total: session
                    .amount_total
                    .map(money::from_minor_units)
                    .unwrap_or(0.0),
                stripe_checkout_id: Some(session.id),
                address_line1: None,
                address_line2: None,
                city: None,
                state: None,
                postal_code: None,
                country: None,
                items: Vec::new(),
            },
        }));
    };

    let items = fetch_order_items(&state, &order.id).await;
    Ok(Json(OrderResponse {
        order: OrderView::from_order(order, items),
    }))
}

/// Order detail by order id, scoped to the caller. An order belonging
/// to another user is 403, a missing row 404.
#[instrument(skip(state, headers))]
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&state, &headers).await?;

    let order = state
        .store
        .order_by_id(&order_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(ShopError::NotFound(format!("order {}", order_id))))?;

    if order.user_id != user.id {
        return Err(error_response(ShopError::Forbidden(
            "order belongs to another user".to_string(),
        )));
    }

    let items = fetch_order_items(&state, &order.id).await;
    Ok(Json(OrderResponse {
        order: OrderView::from_order(order, items),
    }))
}

/// Joined order lines; a failed read degrades to an empty list
async fn fetch_order_items(state: &AppState, order_id: &str) -> Vec<OrderItemDetail> {
    match state.store.order_items_for_order(order_id).await {
        Ok(items) => items,
        Err(e) => {
            error!("Error fetching items for order {}: {}", order_id, e);
            Vec::new()
        }
    }
}

/// List the product catalog
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let products = state.store.list_products().await.map_err(error_response)?;
    let count = products.len();
    Ok(Json(serde_json::json!({
        "products": products,
        "count": count
    })))
}

/// Get a single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let product = state
        .store
        .product_by_id(&product_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            error_response(ShopError::NotFound(format!("product {}", product_id)))
        })?;

    Ok(Json(product))
}

/// Password sign-in, delegated to the auth collaborator
#[instrument(skip(state, credentials), fields(email = %credentials.email))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .auth
        .sign_in_with_password(&credentials)
        .await
        .map_err(error_response)?;
    Ok(Json(session))
}

/// Account creation, delegated to the auth collaborator
#[instrument(skip(state, credentials), fields(email = %credentials.email))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .auth
        .sign_up(&credentials)
        .await
        .map_err(error_response)?;
    Ok(Json(session))
}

/// Revoke the caller's session
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = bearer_token(&headers)
        .ok_or_else(|| error_response(ShopError::Unauthorized("no session token".to_string())))?;
    state.auth.sign_out(&token).await.map_err(error_response)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Checkout success page (target of the payment platform's redirect)
pub async fn checkout_success(
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let session_id = params
        .get("session_id")
        .map(|s| s.as_str())
        .unwrap_or("unknown");
    axum::response::Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>Order Confirmed</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0;">
    <div style="padding: 60px; text-align: center;">
        <h1>Thank you for your order!</h1>
        <p>Session: <code>{}</code></p>
        <p style="color: #666;">A confirmation has been sent to your email.</p>
    </div>
</body>
</html>
"#,
        session_id
    ))
}

/// Cart page (target of the payment platform's cancel redirect)
pub async fn cart_page() -> impl IntoResponse {
    axum::response::Html(
        r#"
<!DOCTYPE html>
<html>
<head><title>Your Cart</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0;">
    <div style="padding: 60px; text-align: center;">
        <h1>Your Cart</h1>
        <p style="color: #666;">Checkout was cancelled. No charges were made.</p>
    </div>
</body>
</html>
"#,
    )
}
