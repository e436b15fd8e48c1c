//! Core data model, error taxonomy, condition evaluator, workflow engine,
//! and agent execution core for agentflow.
//!
//! This crate has no knowledge of concrete LLM wire formats
//! (`agentflow-providers`), persistence backends (`agentflow-checkpoint`'s
//! storage adapters), or batching/budget policy (`agentflow-runtime`) — it
//! defines the shapes and execution logic those crates are bounded by.

pub mod agent;
pub mod artifact;
pub mod condition;
pub mod error;
pub mod handoff;
pub mod messages;
pub mod reflection;
pub mod workflow;

pub use error::{AgentFlowError, ErrorKind, Result};
pub use messages::{
    Attachment, AttachmentData, ChatRequest, ChatResponse, Choice, FinishReason, Message, Role,
    SamplingParams, StreamChunk, ToolCall, ToolChoice, ToolSchema, Usage,
};
