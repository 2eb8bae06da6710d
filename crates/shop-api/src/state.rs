//! # Application State
//!
//! Shared state for the Axum application: the three collaborator seams
//! (auth, data store, payments), configuration, and the reconciliation
//! queue handle.

use crate::reconcile::{ReconcileQueue, ReconcileWorker};
use shop_core::{BoxedAuthProvider, BoxedDataStore, BoxedPaymentsProvider};
use shop_stripe::StripeClient;
use shop_supabase::{SupabaseAuth, SupabaseStore};
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL used when the request carries no Origin header
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Auth collaborator
    pub auth: BoxedAuthProvider,
    /// Data-store collaborator
    pub store: BoxedDataStore,
    /// Payments collaborator
    pub payments: BoxedPaymentsProvider,
    /// Retry queue for order bookkeeping that failed after session creation
    pub reconcile: ReconcileQueue,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create an AppState wired to Supabase and Stripe, spawning the
    /// reconciliation worker.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let supabase_config = shop_supabase::SupabaseConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Supabase: {}", e))?;

        let auth: BoxedAuthProvider = Arc::new(SupabaseAuth::new(supabase_config.clone()));
        let store: BoxedDataStore = Arc::new(SupabaseStore::new(supabase_config));

        let payments: BoxedPaymentsProvider = Arc::new(
            StripeClient::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?,
        );

        let (reconcile, rx) = ReconcileQueue::channel(64);
        ReconcileWorker::new(store.clone()).spawn(rx);

        Ok(Self {
            auth,
            store,
            payments,
            reconcile,
            config,
        })
    }

    /// Assemble state from explicit collaborators (tests, embedding)
    pub fn from_parts(
        auth: BoxedAuthProvider,
        store: BoxedDataStore,
        payments: BoxedPaymentsProvider,
        reconcile: ReconcileQueue,
        config: AppConfig,
    ) -> Self {
        Self {
            auth,
            store,
            payments,
            reconcile,
            config,
        }
    }
}
