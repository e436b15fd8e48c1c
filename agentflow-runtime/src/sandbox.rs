//! Sandbox executor: validation, timeout, and output-size truncation
//! wrapped around a pluggable execution backend (container, local
//! process, or anything else implementing [`SandboxBackend`]).

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub command: String,
    pub args: Vec<String>,
    pub input: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// Set when `stdout`/`stderr` were cut to `max_output_bytes`.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// A pluggable execution backend. Container and local-process backends are
/// plugins; this core only enforces timeout, resource caps, and output
/// truncation around whatever backend is wired in.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    async fn run(&self, request: &SandboxRequest) -> Result<SandboxOutput>;
}

pub struct SandboxExecutor<B> {
    backend: B,
    limits: SandboxLimits,
}

impl<B: SandboxBackend> SandboxExecutor<B> {
    pub fn new(backend: B, limits: SandboxLimits) -> Self {
        Self { backend, limits }
    }

    fn validate(request: &SandboxRequest) -> Result<()> {
        if request.command.trim().is_empty() {
            return Err(RuntimeError::SandboxValidation(
                "command must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub async fn execute(&self, request: SandboxRequest) -> Result<SandboxOutput> {
        Self::validate(&request)?;

        let result = tokio_timeout(self.limits.timeout, self.backend.run(&request)).await;
        let mut output = match result {
            Ok(inner) => inner?,
            Err(_) => {
                warn!(command = %request.command, timeout = ?self.limits.timeout, "sandbox command timed out");
                return Err(RuntimeError::SandboxTimeout(self.limits.timeout));
            }
        };

        let cap = self.limits.max_output_bytes;
        let mut truncated = false;
        if output.stdout.len() > cap {
            output.stdout.truncate(cap);
            truncated = true;
        }
        if output.stderr.len() > cap {
            output.stderr.truncate(cap);
            truncated = true;
        }
        if truncated {
            debug!(command = %request.command, cap, "sandbox output truncated");
        }
        output.truncated = output.truncated || truncated;
        Ok(output)
    }
}
