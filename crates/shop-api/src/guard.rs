//! # Route Guard
//!
//! Request-time gate over a fixed list of protected path prefixes.
//! Per request the outcome is one of two states: Allowed (pass through
//! unchanged) or Redirected (to the sign-in page, carrying the original
//! path in a `redirect` query parameter). Stateless.

use crate::handlers::bearer_token;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

/// Path prefixes that require an authenticated session
pub const PROTECTED_PREFIXES: &[&str] = &["/profile", "/cart", "/checkout", "/orders"];

/// Sign-in page path used as the redirect target
pub const SIGNIN_PATH: &str = "/auth/signin";

/// Outcome of the guard for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Pass the request through unchanged
    Allowed,
    /// Redirect to the sign-in page, preserving the original path
    Redirected(String),
}

/// Whether a path falls under one of the protected prefixes
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Pure guard decision: protected path without a session redirects,
/// everything else is allowed. The original path travels in the
/// `redirect` query parameter, percent-encoded.
pub fn decide(path: &str, authenticated: bool) -> GuardDecision {
    if is_protected(path) && !authenticated {
        let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        GuardDecision::Redirected(format!("{SIGNIN_PATH}?redirect={encoded}"))
    } else {
        GuardDecision::Allowed
    }
}

/// Axum middleware wrapping [`decide`]. The auth collaborator is only
/// consulted for protected paths.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    if !is_protected(&path) {
        return next.run(request).await;
    }

    let authenticated = match bearer_token(request.headers()) {
        Some(token) => matches!(state.auth.get_user(&token).await, Ok(Some(_))),
        None => false,
    };

    match decide(&path, authenticated) {
        GuardDecision::Allowed => next.run(request).await,
        GuardDecision::Redirected(target) => {
            debug!("Redirecting unauthenticated request: {} -> {}", path, target);
            Redirect::temporary(&target).into_response()
        }
    }
}
