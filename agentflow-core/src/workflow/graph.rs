//! Workflow DSL types: the declarative shape a [`super::engine::Runner`]
//! executes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Join policy for a `parallel` node's branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// All branches must succeed.
    All,
    /// Any single branch succeeding is enough.
    Any,
    /// At least `quorum` branches (stored alongside) must succeed.
    Quorum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelBranch {
    pub id: String,
    pub entry_node: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    pub body_entry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub while_expr: Option<String>,
    /// Hard safety ceiling applied even to `for` loops and always to
    /// `while` loops.
    pub hard_max_iterations: u32,
}

/// A reference to a unit of work: either a named step known to the host
/// application, or an inline step definition carried in the DSL itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRef {
    Named(String),
    Inline { agent_id: String, prompt: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Action {
        step: StepRef,
        #[serde(default)]
        next: Vec<String>,
    },
    Condition {
        expression: String,
        on_true: String,
        on_false: String,
    },
    Loop {
        #[serde(flatten)]
        spec: LoopSpec,
        #[serde(default)]
        next: Option<String>,
    },
    Parallel {
        branches: Vec<ParallelBranch>,
        join: JoinPolicy,
        #[serde(default)]
        quorum: Option<usize>,
        #[serde(default)]
        next: Option<String>,
    },
    Subgraph {
        workflow: String,
        #[serde(default)]
        next: Option<String>,
    },
    Checkpoint {
        #[serde(default)]
        next: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Strict = unresolved `${...}` interpolations are a hard error; Lenient =
/// substituted with an empty string. Lenient is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Strict,
    Lenient,
}

impl Default for InterpolationMode {
    fn default() -> Self {
        InterpolationMode::Lenient
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub interpolation: InterpolationMode,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMode::Lenient,
        }
    }
}

/// A directed graph of [`Node`]s keyed by id, an entry node, and a merged
/// variable mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub entry: String,
    pub nodes: HashMap<String, Node>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub subgraphs: HashMap<String, Workflow>,
    #[serde(skip, default)]
    pub config: WorkflowConfigSerde,
}

/// `WorkflowConfig` is not `Serialize`/`Deserialize` (it's engine-side
/// configuration, not DSL data); this thin wrapper lets `Workflow` derive
/// both while keeping `#[serde(skip)]` on the field.
#[derive(Debug, Clone, Default)]
pub struct WorkflowConfigSerde(pub WorkflowConfig);

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}
