//! Error types for the SmartGPT core
//!
//! Provides the unified error type surfaced by the orchestrating layer. Each
//! component crate keeps its own `thiserror` enum and converts into
//! [`SmartError`] at the boundary, keeping the original cause as the source.

use thiserror::Error;

/// Boxed cause carried by [`SmartError`] variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using SmartError
pub type Result<T> = std::result::Result<T, SmartError>;

/// Unified error type for SmartGPT core operations
#[derive(Debug, Error)]
pub enum SmartError {
    // Configuration errors (bad env values, unreadable settings)
    #[error("Configuration error: {0}")]
    Config(String),

    // Memory store and embedding failures
    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    // Retriever failures that survived the per-call fallback
    #[error("Retrieval error: {0}")]
    Retrieval(#[source] BoxError),

    // Explorer aborted by a callback failure
    #[error("Exploration error: {0}")]
    Exploration(#[source] BoxError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SmartError {
    /// Build a configuration error for an environment variable that failed to parse
    pub fn invalid_setting(key: &str, value: &str) -> Self {
        SmartError::Config(format!("invalid value for {}: {:?}", key, value))
    }
}

impl From<serde_json::Error> for SmartError {
    fn from(err: serde_json::Error) -> Self {
        SmartError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SmartError {
    fn from(err: std::io::Error) -> Self {
        SmartError::Storage(Box::new(err))
    }
}

impl From<anyhow::Error> for SmartError {
    fn from(err: anyhow::Error) -> Self {
        SmartError::Internal(err.to_string())
    }
}
