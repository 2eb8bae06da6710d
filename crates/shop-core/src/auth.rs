//! # Auth Collaborator
//!
//! Trait seam over the hosted authentication platform. The handlers only
//! ever see an optional [`AuthUser`]; token refresh and session storage
//! stay inside the implementation.

use crate::error::ShopResult;
use crate::model::AuthUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Credentials for password sign-in and sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An issued session: access token plus the identity it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// Authentication provider seam
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to an identity. Returns `Ok(None)` for a
    /// missing or invalid session rather than an error; handlers decide
    /// whether that is `Unauthorized`.
    async fn get_user(&self, bearer_token: &str) -> ShopResult<Option<AuthUser>>;

    /// Password sign-in
    async fn sign_in_with_password(&self, credentials: &Credentials) -> ShopResult<AuthSession>;

    /// Create a new account
    async fn sign_up(&self, credentials: &Credentials) -> ShopResult<AuthSession>;

    /// Revoke the session behind a bearer token
    async fn sign_out(&self, bearer_token: &str) -> ShopResult<()>;
}

/// Type alias for a shared auth provider (dynamic dispatch)
pub type BoxedAuthProvider = Arc<dyn AuthProvider>;
