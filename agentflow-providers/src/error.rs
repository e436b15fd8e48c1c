//! Error types for provider gateway implementations.

use agentflow_core::error::{AgentFlowError, ErrorKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("API key not found: {0}")]
    ApiKeyMissing(String),

    #[error("rewriter rejected request: {0}")]
    RewriterRejected(String),

    #[error("{0}")]
    Upstream(AgentFlowError),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Serialization(err.to_string())
    }
}

impl From<AgentFlowError> for ProviderError {
    fn from(err: AgentFlowError) -> Self {
        ProviderError::Upstream(err)
    }
}

/// Folds a provider-local error into the shared taxonomy so callers above
/// the gateway never need to know which backend produced it.
impl From<ProviderError> for AgentFlowError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream(e) => e,
            ProviderError::ApiKeyMissing(msg) => {
                AgentFlowError::new(ErrorKind::Unauthorized, msg)
            }
            ProviderError::RewriterRejected(msg) => {
                AgentFlowError::new(ErrorKind::InvalidRequest, msg)
            }
            ProviderError::Http(e) => AgentFlowError::new(ErrorKind::UpstreamError, e.to_string()),
            ProviderError::Serialization(msg) => {
                AgentFlowError::new(ErrorKind::InvalidRequest, msg)
            }
        }
    }
}
