//! Error types for utility helpers.

use thiserror::Error;

/// Result type for utility operations.
pub type Result<T> = std::result::Result<T, UtilsError>;

/// Errors that can occur in shared utility helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Environment variable missing or invalid.
    #[error("environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    /// I/O error while loading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input supplied by a caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for UtilsError {
    fn from(err: serde_json::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for UtilsError {
    fn from(err: serde_yaml::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}
