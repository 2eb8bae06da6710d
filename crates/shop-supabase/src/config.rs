//! # Supabase Configuration
//!
//! Project URL and API keys, loaded from environment variables.

use shop_core::ShopError;
use std::env;

/// Supabase project configuration
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (https://<ref>.supabase.co)
    pub url: String,

    /// Anon (publishable) key; used for auth calls
    pub anon_key: String,

    /// Service-role key for server-side table access. Falls back to the
    /// anon key when not set, which restricts access to RLS-permitted rows.
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `SUPABASE_SERVICE_ROLE_KEY`
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let url = env::var("SUPABASE_URL")
            .map_err(|_| ShopError::Configuration("SUPABASE_URL not set".to_string()))?;

        let anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ShopError::Configuration("SUPABASE_ANON_KEY not set".to_string()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ShopError::Configuration(
                "SUPABASE_URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: None,
        }
    }

    /// Builder: set the service-role key
    pub fn with_service_role_key(mut self, key: impl Into<String>) -> Self {
        self.service_role_key = Some(key.into());
        self
    }

    /// The key used for table access
    pub fn table_key(&self) -> &str {
        self.service_role_key.as_deref().unwrap_or(&self.anon_key)
    }

    /// PostgREST base (`{url}/rest/v1`)
    pub fn rest_base(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    /// GoTrue base (`{url}/auth/v1`)
    pub fn auth_base(&self) -> String {
        format!("{}/auth/v1", self.url)
    }
}
