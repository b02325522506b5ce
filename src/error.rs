//! Error types for Hark.

use thiserror::Error;

/// Library-level error type for Hark operations.
#[derive(Error, Debug)]
pub enum HarkError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for Hark operations.
pub type Result<T> = std::result::Result<T, HarkError>;
