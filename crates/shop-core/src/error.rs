//! # Storefront Error Types
//!
//! Typed error handling for the storefront service.
//! All fallible operations return `Result<T, ShopError>`.

use thiserror::Error;

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// No or invalid authenticated session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or empty input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authenticated but not entitled to the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No matching record anywhere
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data-store or payments-platform call failed or returned an
    /// unexpected shape
    #[error("Upstream error [{source_name}]: {message}")]
    Upstream { source_name: String, message: String },

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShopError {
    /// Convenience constructor for upstream failures
    pub fn upstream(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ShopError::Upstream {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Unauthorized(_) => 401,
            ShopError::InvalidRequest(_) => 400,
            ShopError::Forbidden(_) => 403,
            ShopError::NotFound(_) => 404,
            ShopError::Upstream { .. } => 500,
            ShopError::Configuration(_) => 500,
            ShopError::Serialization(_) => 500,
        }
    }

    /// Generic caller-facing message. Internal detail (upstream bodies,
    /// parse errors) stays in the logs and is never forwarded.
    pub fn public_message(&self) -> &'static str {
        match self {
            ShopError::Unauthorized(_) => "You must be logged in",
            ShopError::InvalidRequest(_) => "Invalid request",
            ShopError::Forbidden(_) => "You do not have access to this resource",
            ShopError::NotFound(_) => "Not found",
            ShopError::Upstream { .. } => "An upstream service failed",
            ShopError::Configuration(_) => "Service misconfigured",
            ShopError::Serialization(_) => "Internal error",
        }
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;
