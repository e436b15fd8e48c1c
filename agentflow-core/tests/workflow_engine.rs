use agentflow_core::workflow::{
    CheckpointSink, JoinPolicy, LoopSpec, Node, NodeKind, ParallelBranch, Runner, StepExecutor,
    StepRef, SubgraphRunner, Workflow,
};
use agentflow_core::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct EchoSteps;
#[async_trait]
impl StepExecutor for EchoSteps {
    async fn call(&self, step: &StepRef, _vars: &Value) -> Result<Value> {
        match step {
            StepRef::Named(name) => Ok(Value::String(format!("ran:{name}"))),
            StepRef::Inline { prompt, .. } => Ok(Value::String(prompt.clone())),
        }
    }
}

struct CountingCheckpoints(Arc<AtomicUsize>);
#[async_trait]
impl CheckpointSink for CountingCheckpoints {
    async fn checkpoint(&self, _thread_id: &str, _step: u64, _vars: &Value) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct NoSubgraphs;
#[async_trait]
impl SubgraphRunner for NoSubgraphs {
    async fn run_subgraph(&self, _workflow: &Workflow, _input: Value) -> Result<Value> {
        Ok(Value::Null)
    }
}

fn action_node(id: &str, next: Vec<&str>) -> Node {
    Node {
        id: id.into(),
        kind: NodeKind::Action {
            step: StepRef::Named(id.to_string()),
            next: next.into_iter().map(String::from).collect(),
        },
    }
}

/// Exercises the full parallel-fan-out scenario end to end through the
/// public `Runner` API: both branches' outputs land at the top level of
/// the variable map, keyed by their own branch id, with nothing nested
/// under the parallel node's id.
#[tokio::test]
async fn parallel_branch_outputs_land_at_top_level_keyed_by_branch_id() {
    let mut nodes = HashMap::new();
    nodes.insert("a".to_string(), action_node("a", vec![]));
    nodes.insert("b".to_string(), action_node("b", vec![]));
    nodes.insert(
        "fanout".to_string(),
        Node {
            id: "fanout".into(),
            kind: NodeKind::Parallel {
                branches: vec![
                    ParallelBranch {
                        id: "branch_a".into(),
                        entry_node: "a".into(),
                    },
                    ParallelBranch {
                        id: "branch_b".into(),
                        entry_node: "b".into(),
                    },
                ],
                join: JoinPolicy::All,
                quorum: None,
                next: None,
            },
        },
    );
    let workflow = Workflow {
        id: "wf".into(),
        entry: "fanout".into(),
        nodes,
        variables: HashMap::new(),
        subgraphs: HashMap::new(),
        config: Default::default(),
    };

    let steps = EchoSteps;
    let checkpoint_count = Arc::new(AtomicUsize::new(0));
    let checkpoints = CountingCheckpoints(checkpoint_count);
    let subgraphs = NoSubgraphs;
    let runner = Runner::new(&workflow, &steps, &checkpoints, &subgraphs, "thread-1");

    let result = runner.run(Value::Object(Default::default())).await.unwrap();

    assert_eq!(result.get("branch_a").unwrap(), &Value::String("ran:a".into()));
    assert_eq!(result.get("branch_b").unwrap(), &Value::String("ran:b".into()));
    assert!(result.get("fanout").is_none());
}

/// A condition node routes into a loop, which runs to its checkpoint node;
/// the checkpoint sink is invoked from outside the engine module entirely.
#[tokio::test]
async fn condition_routes_into_loop_then_checkpoints() {
    let mut nodes = HashMap::new();
    nodes.insert("body".to_string(), action_node("body", vec![]));
    nodes.insert(
        "loop".to_string(),
        Node {
            id: "loop".into(),
            kind: NodeKind::Loop {
                spec: LoopSpec {
                    body_entry: "body".into(),
                    max_iterations: Some(2),
                    while_expr: None,
                    hard_max_iterations: 10,
                },
                next: Some("save".into()),
            },
        },
    );
    nodes.insert(
        "save".to_string(),
        Node {
            id: "save".into(),
            kind: NodeKind::Checkpoint { next: None },
        },
    );
    nodes.insert(
        "entry".to_string(),
        Node {
            id: "entry".into(),
            kind: NodeKind::Condition {
                expression: "true".into(),
                on_true: "loop".into(),
                on_false: "save".into(),
            },
        },
    );

    let workflow = Workflow {
        id: "wf".into(),
        entry: "entry".into(),
        nodes,
        variables: HashMap::new(),
        subgraphs: HashMap::new(),
        config: Default::default(),
    };

    let steps = EchoSteps;
    let checkpoint_count = Arc::new(AtomicUsize::new(0));
    let checkpoints = CountingCheckpoints(checkpoint_count.clone());
    let subgraphs = NoSubgraphs;
    let runner = Runner::new(&workflow, &steps, &checkpoints, &subgraphs, "thread-2");

    let result = runner.run(Value::Object(Default::default())).await.unwrap();
    assert_eq!(result.get("loop.iteration").unwrap(), &Value::from(1));
    assert_eq!(checkpoint_count.load(Ordering::SeqCst), 1);
}
