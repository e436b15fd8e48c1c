//! Error types for the budget, batch, and sandbox subsystems.

use agentflow_core::error::{AgentFlowError, ErrorKind};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("throttled, retry after {0:?}")]
    Throttled(Duration),

    #[error("batch queue is full")]
    QueueFull,

    #[error("no response returned for request '{0}'")]
    NoResponse(String),

    #[error("sandbox validation failed: {0}")]
    SandboxValidation(String),

    #[error("sandbox execution timed out after {0:?}")]
    SandboxTimeout(Duration),

    #[error("{0}")]
    Upstream(AgentFlowError),
}

impl From<AgentFlowError> for RuntimeError {
    fn from(err: AgentFlowError) -> Self {
        RuntimeError::Upstream(err)
    }
}

impl From<RuntimeError> for AgentFlowError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Upstream(e) => e,
            RuntimeError::BudgetExceeded(msg) => AgentFlowError::budget_exceeded(msg, None),
            RuntimeError::Throttled(d) => AgentFlowError::throttled(d),
            RuntimeError::QueueFull => {
                AgentFlowError::new(ErrorKind::Throttled, "batch queue is full")
            }
            RuntimeError::NoResponse(id) => AgentFlowError::new(
                ErrorKind::UpstreamError,
                format!("no response for request '{id}'"),
            ),
            RuntimeError::SandboxValidation(msg) => AgentFlowError::validation(msg),
            RuntimeError::SandboxTimeout(_) => AgentFlowError::timeout("sandbox execution timed out"),
        }
    }
}
