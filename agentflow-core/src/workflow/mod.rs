//! The Workflow Engine: DAG/subgraph executor with conditions, loops,
//! parallel fan-out, and static DSL validation.

pub mod engine;
pub mod graph;
pub mod validate;

pub use engine::{interpolate, CheckpointSink, Runner, StepExecutor, SubgraphRunner};
pub use graph::{
    InterpolationMode, JoinPolicy, LoopSpec, Node, NodeKind, ParallelBranch, StepRef, Workflow,
    WorkflowConfig,
};
pub use validate::{validate, ValidationIssue};
