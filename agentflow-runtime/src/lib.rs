//! Budget accounting, request batching, and sandboxed tool execution — the
//! resource-governance layer the gateway and workflow engine sit behind.

pub mod batch;
pub mod budget;
pub mod error;
pub mod sandbox;

pub use batch::{BatchConfig, BatchHandler, BatchProcessor, BatchStats};
pub use budget::{BudgetDecision, BudgetLimits, BudgetManager};
pub use error::{Result, RuntimeError};
pub use sandbox::{SandboxBackend, SandboxExecutor, SandboxLimits, SandboxOutput, SandboxRequest};
