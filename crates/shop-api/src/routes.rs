//! # Routes
//!
//! Router assembly for the storefront API. JSON endpoints live under
//! `/api`; the two HTML pages the payment redirect targets sit at the
//! root behind the route guard.

use crate::guard::route_guard;
use crate::handlers;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/checkout/session", get(handlers::get_checkout_session))
        .route("/orders/session", get(handlers::get_order_by_session))
        .route("/orders/{id}", get(handlers::get_order))
        .route("/products", get(handlers::list_products))
        .route("/products/{id}", get(handlers::get_product))
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/signout", post(handlers::sign_out));

    // Page routes pass through the guard; API routes authorize per
    // handler instead of redirecting
    let pages = Router::new()
        .route("/checkout/success", get(handlers::checkout_success))
        .route("/cart", get(handlers::cart_page))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard));

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .merge(pages)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
