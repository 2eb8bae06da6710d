//! # Supabase Auth
//!
//! Implementation of the auth collaborator against the GoTrue API:
//! bearer-token resolution, password sign-in, sign-up, and sign-out.
//! Token refresh and session cookies are the platform's concern, not
//! this client's.

use crate::config::SupabaseConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shop_core::{AuthProvider, AuthSession, AuthUser, Credentials, ShopError, ShopResult};
use tracing::{debug, error, instrument};

/// Supabase-backed auth provider
pub struct SupabaseAuth {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseAuth {
    /// Create a new auth provider
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

    async fn grant_session(&self, url: String, credentials: &Credentials) -> ShopResult<AuthSession> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase-auth", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("supabase-auth", e.to_string()))?;

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            debug!("Auth grant rejected: status={}", status);
            return Err(ShopError::Unauthorized("invalid credentials".to_string()));
        }

        if !status.is_success() {
            error!("GoTrue error: status={}, body={}", status, body);
            return Err(ShopError::upstream(
                "supabase-auth",
                format!("HTTP {}", status),
            ));
        }

        let session: GoTrueSession = serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("auth session: {}", e)))?;

        Ok(AuthSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user: AuthUser {
                id: session.user.id,
                email: session.user.email,
            },
        })
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    #[instrument(skip(self, bearer_token))]
    async fn get_user(&self, bearer_token: &str) -> ShopResult<Option<AuthUser>> {
        let response = self
            .client
            .get(format!("{}/user", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", bearer_token))
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase-auth", e.to_string()))?;

        let status = response.status();

        // An invalid or expired token is "no session", not a failure
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ShopError::upstream("supabase-auth", e.to_string()))?;

        if !status.is_success() {
            error!("GoTrue error: status={}, body={}", status, body);
            return Err(ShopError::upstream(
                "supabase-auth",
                format!("HTTP {}", status),
            ));
        }

        let user: GoTrueUser = serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("auth user: {}", e)))?;

        Ok(Some(AuthUser {
            id: user.id,
            email: user.email,
        }))
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in_with_password(&self, credentials: &Credentials) -> ShopResult<AuthSession> {
        self.grant_session(
            format!("{}/token?grant_type=password", self.config.auth_base()),
            credentials,
        )
        .await
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_up(&self, credentials: &Credentials) -> ShopResult<AuthSession> {
        self.grant_session(format!("{}/signup", self.config.auth_base()), credentials)
            .await
    }

    #[instrument(skip(self, bearer_token))]
    async fn sign_out(&self, bearer_token: &str) -> ShopResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", bearer_token))
            .send()
            .await
            .map_err(|e| ShopError::upstream("supabase-auth", e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            return Err(ShopError::upstream(
                "supabase-auth",
                format!("HTTP {}", status),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// GoTrue API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    /// Empty when email confirmation is pending; the frontend prompts
    /// the user to confirm before signing in
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_auth(base_url: &str) -> SupabaseAuth {
        SupabaseAuth::new(SupabaseConfig::new(base_url, "anon-key"))
    }

    #[tokio::test]
    async fn test_get_user_resolves_identity() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-1",
                "email": "a@b.test",
                "role": "authenticated"
            })))
            .mount(&server)
            .await;

        let auth = test_auth(&server.uri());
        let user = auth.get_user("some-jwt").await.unwrap().unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("a@b.test"));
    }

    #[tokio::test]
    async fn test_get_user_invalid_token_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "invalid JWT"
            })))
            .mount(&server)
            .await;

        let auth = test_auth(&server.uri());
        assert!(auth.get_user("bad-jwt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-abc",
                "refresh_token": "refresh-abc",
                "user": {"id": "user-1", "email": "a@b.test"}
            })))
            .mount(&server)
            .await;

        let auth = test_auth(&server.uri());
        let session = auth
            .sign_in_with_password(&Credentials {
                email: "a@b.test".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token, "jwt-abc");
        assert_eq!(session.user.id, "user-1");
    }

    #[tokio::test]
    async fn test_sign_in_bad_credentials_is_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = test_auth(&server.uri());
        let err = auth
            .sign_in_with_password(&Credentials {
                email: "a@b.test".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sign_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let auth = test_auth(&server.uri());
        auth.sign_out("some-jwt").await.unwrap();
    }
}
