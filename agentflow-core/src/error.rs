//! The agentflow error taxonomy.
//!
//! Every user-observable failure in the core funnels through [`AgentFlowError`]
//! so that callers across the gateway, budget layer, workflow engine, and
//! agent execution core see one shape: a [`ErrorKind`], a message, an
//! optional HTTP-like status, a retry flag, and an optional provider tag.
//!
//! **Recovery policy**:
//! - `RateLimited` / `UpstreamError` / `ModelOverloaded` are retryable; the
//!   core never retries silently so budget accounting stays correct.
//! - `InvalidRequest` / `ValidationFailed` / `InvalidTransition` surface
//!   immediately and are never retried.
//! - `BudgetExceeded` / `Throttled` carry a retry-after hint where available.
//! - `Cancelled` / `Timeout` unwind the caller; checkpoint history is
//!   preserved, never rewritten.

use std::time::Duration;
use thiserror::Error;

/// Result type used throughout `agentflow-core`.
pub type Result<T> = std::result::Result<T, AgentFlowError>;

/// The stable, user-observable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    RateLimited,
    QuotaExceeded,
    ModelOverloaded,
    InvalidRequest,
    UpstreamError,
    NotFound,
    InvalidTransition,
    BudgetExceeded,
    Throttled,
    Timeout,
    Cancelled,
    ValidationFailed,
    LoopOverflow,
}

impl ErrorKind {
    /// Whether errors of this kind are retryable by the caller.
    ///
    /// Mirrors the recovery policy table exactly; this is the single source of
    /// truth other components consult instead of re-deriving retryability.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::UpstreamError | ErrorKind::ModelOverloaded
        )
    }
}

/// The core error type: a typed kind plus the context needed to act on it.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AgentFlowError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub retryable: bool,
    pub provider: Option<String>,
    pub retry_after: Option<Duration>,
}

impl AgentFlowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.is_retryable();
        Self {
            kind,
            message: message.into(),
            status: None,
            retryable,
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_retry_after(mut self, d: Duration) -> Self {
        self.retry_after = Some(d);
        self
    }

    /// Maps an HTTP-like status (plus an optional body snippet to sniff for
    /// quota/overload phrases) to the taxonomy above.
    pub fn from_http_status(status: u16, body_hint: &str, provider: impl Into<String>) -> Self {
        let hint = body_hint.to_ascii_lowercase();
        let kind = match status {
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            429 => ErrorKind::RateLimited,
            400 if hint.contains("quota") || hint.contains("credit") => ErrorKind::QuotaExceeded,
            529 => ErrorKind::ModelOverloaded,
            _ if hint.contains("overloaded") => ErrorKind::ModelOverloaded,
            500..=599 => ErrorKind::UpstreamError,
            400..=499 => ErrorKind::InvalidRequest,
            _ => ErrorKind::UpstreamError,
        };
        AgentFlowError::new(kind, format!("upstream returned {status}: {body_hint}"))
            .with_status(status)
            .with_provider(provider)
    }

    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        AgentFlowError::new(
            ErrorKind::InvalidTransition,
            format!("illegal transition from {from:?} to {to:?}"),
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AgentFlowError::new(ErrorKind::NotFound, what)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AgentFlowError::new(ErrorKind::ValidationFailed, msg)
    }

    pub fn cancelled() -> Self {
        AgentFlowError::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        AgentFlowError::new(ErrorKind::Timeout, msg)
    }

    pub fn loop_overflow(max_iterations: usize) -> Self {
        AgentFlowError::new(
            ErrorKind::LoopOverflow,
            format!("loop exceeded max_iterations={max_iterations}"),
        )
    }

    pub fn budget_exceeded(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let mut e = AgentFlowError::new(ErrorKind::BudgetExceeded, msg);
        e.retry_after = retry_after;
        e
    }

    pub fn throttled(retry_after: Duration) -> Self {
        AgentFlowError::new(ErrorKind::Throttled, "throttled, retry later")
            .with_retry_after(retry_after)
    }
}
