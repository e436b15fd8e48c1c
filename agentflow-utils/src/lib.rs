//! Shared pooling primitives and config helpers for agentflow.
//!
//! This crate has no knowledge of agents, workflows, or providers — it only
//! supplies the small amount of ambient plumbing (pools, env/config loading)
//! that the other crates would otherwise each reinvent.

pub mod config;
pub mod error;
pub mod pool;

pub use error::{Result, UtilsError};
pub use pool::{ObjectPool, PooledGuard, Resettable, WorkerStats};
