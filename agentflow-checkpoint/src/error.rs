//! Error types for checkpoint storage.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckpointError>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("thread '{0}' has no checkpoints")]
    EmptyThread(String),

    #[error("checkpoint '{0}' not found for thread '{1}'")]
    NotFound(String, String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}
