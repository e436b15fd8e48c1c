//! The workflow runner: executes a [`Workflow`] node by node
//! subgraphs, and checkpoints.
//!
//! Steps, subgraph resolution, and checkpointing are all capabilities
//! (trait objects) passed in by the caller rather than imported
//! concretely — the same pattern the design notes use to break the
//! agent/workflow cyclic dependency.
//!
//! Execution is implemented as a tree of free functions rather than
//! methods on `&mut self` so that `parallel` branches can each hold their
//! own concurrent borrow of the shared, read-only execution context
//! (workflow graph + capabilities) while mutating only their own private
//! copy of the variable map.

use super::graph::{InterpolationMode, JoinPolicy, Node, NodeKind, StepRef, Workflow};
use crate::error::{AgentFlowError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Executes a named or inline step against the current variable map.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn call(&self, step: &StepRef, vars: &Value) -> Result<Value>;
}

/// Persists a checkpoint of the current variable map at a `checkpoint`
/// node. A no-op implementation is valid when checkpointing is disabled.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn checkpoint(&self, thread_id: &str, step: u64, vars: &Value) -> Result<()>;
}

/// Executes a `subgraph` node by running a nested workflow to completion.
#[async_trait]
pub trait SubgraphRunner: Send + Sync {
    async fn run_subgraph(&self, workflow: &Workflow, input: Value) -> Result<Value>;
}

/// Read-only execution context shared by every node and every parallel
/// branch; only the variable map (owned per-branch) is mutated.
struct Ctx<'a> {
    workflow: &'a Workflow,
    steps: &'a dyn StepExecutor,
    checkpoints: &'a dyn CheckpointSink,
    subgraphs: &'a dyn SubgraphRunner,
    thread_id: &'a str,
    step_counter: &'a AtomicU64,
}

impl<'a> Ctx<'a> {
    fn fork(&self) -> Ctx<'a> {
        Ctx {
            workflow: self.workflow,
            steps: self.steps,
            checkpoints: self.checkpoints,
            subgraphs: self.subgraphs,
            thread_id: self.thread_id,
            step_counter: self.step_counter,
        }
    }
}

pub struct Runner<'a> {
    workflow: &'a Workflow,
    steps: &'a dyn StepExecutor,
    checkpoints: &'a dyn CheckpointSink,
    subgraphs: &'a dyn SubgraphRunner,
    thread_id: String,
    step_counter: AtomicU64,
}

impl<'a> Runner<'a> {
    pub fn new(
        workflow: &'a Workflow,
        steps: &'a dyn StepExecutor,
        checkpoints: &'a dyn CheckpointSink,
        subgraphs: &'a dyn SubgraphRunner,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow,
            steps,
            checkpoints,
            subgraphs,
            thread_id: thread_id.into(),
            step_counter: AtomicU64::new(0),
        }
    }

    /// Runs the workflow to completion starting at its entry node, seeding
    /// the variable map from workflow variables plus `input` (merged if a
    /// map, else stored under the key `input`).
    pub async fn run(&self, input: Value) -> Result<Value> {
        let mut vars = seed_vars(self.workflow, input);
        let ctx = Ctx {
            workflow: self.workflow,
            steps: self.steps,
            checkpoints: self.checkpoints,
            subgraphs: self.subgraphs,
            thread_id: &self.thread_id,
            step_counter: &self.step_counter,
        };
        run_from(&ctx, &self.workflow.entry, &mut vars).await?;
        Ok(vars)
    }
}

fn seed_vars(workflow: &Workflow, input: Value) -> Value {
    let mut vars = Value::Object(
        workflow
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    match input {
        Value::Object(map) => {
            let obj = vars.as_object_mut().unwrap();
            for (k, v) in map {
                obj.insert(k, v);
            }
        }
        other => {
            vars.as_object_mut()
                .unwrap()
                .insert("input".to_string(), other);
        }
    }
    vars
}

fn run_from<'a>(
    ctx: &'a Ctx<'a>,
    node_id: &'a str,
    vars: &'a mut Value,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let node = ctx
            .workflow
            .node(node_id)
            .ok_or_else(|| AgentFlowError::validation(format!("node '{node_id}' not found")))?;
        execute_node(ctx, node, vars).await
    })
}

fn execute_node<'a>(
    ctx: &'a Ctx<'a>,
    node: &'a Node,
    vars: &'a mut Value,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        debug!(thread = ctx.thread_id, node = %node.id, "executing workflow node");
        match &node.kind {
            NodeKind::Action { step, next } => {
                let result = ctx.steps.call(step, vars).await?;
                insert_var(vars, &node.id, result);
                for n in next {
                    run_from(ctx, n, vars).await?;
                }
                Ok(())
            }
            NodeKind::Condition {
                expression,
                on_true,
                on_false,
            } => {
                let expr = crate::condition::Expr::parse(expression)
                    .map_err(|e| AgentFlowError::validation(e.to_string()))?;
                let taken = if expr.eval(vars) { on_true } else { on_false };
                run_from(ctx, taken, vars).await
            }
            NodeKind::Loop { spec, next } => {
                execute_loop(ctx, &node.id, spec, vars).await?;
                if let Some(n) = next {
                    run_from(ctx, n, vars).await?;
                }
                Ok(())
            }
            NodeKind::Parallel {
                branches,
                join,
                quorum,
                next,
            } => {
                execute_parallel(ctx, branches, *join, *quorum, vars).await?;
                if let Some(n) = next {
                    run_from(ctx, n, vars).await?;
                }
                Ok(())
            }
            NodeKind::Subgraph { workflow, next } => {
                let sub = ctx
                    .workflow
                    .subgraphs
                    .get(workflow)
                    .ok_or_else(|| {
                        AgentFlowError::validation(format!("unknown subgraph '{workflow}'"))
                    })?;
                let output = ctx.subgraphs.run_subgraph(sub, vars.clone()).await?;
                insert_var(vars, &node.id, output);
                if let Some(n) = next {
                    run_from(ctx, n, vars).await?;
                }
                Ok(())
            }
            NodeKind::Checkpoint { next } => {
                let step = ctx.step_counter.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.checkpoints.checkpoint(ctx.thread_id, step, vars).await?;
                if let Some(n) = next {
                    run_from(ctx, n, vars).await?;
                }
                Ok(())
            }
        }
    })
}

async fn execute_loop(
    ctx: &Ctx<'_>,
    node_id: &str,
    spec: &super::graph::LoopSpec,
    vars: &mut Value,
) -> Result<()> {
    let hard_max = spec.hard_max_iterations.max(1) as u64;
    let mut iteration: u64 = 0;
    loop {
        if iteration >= hard_max {
            return Err(AgentFlowError::loop_overflow(hard_max as usize));
        }
        if let Some(max) = spec.max_iterations {
            if iteration >= max as u64 {
                break;
            }
        } else if let Some(expr_src) = &spec.while_expr {
            let expr = crate::condition::Expr::parse(expr_src)
                .map_err(|e| AgentFlowError::validation(e.to_string()))?;
            if !expr.eval(vars) {
                break;
            }
        } else {
            break;
        }

        insert_var(vars, &format!("{node_id}.iteration"), Value::from(iteration));
        run_from(ctx, &spec.body_entry, vars).await?;
        iteration += 1;
    }
    Ok(())
}

async fn execute_parallel(
    ctx: &Ctx<'_>,
    branches: &[super::graph::ParallelBranch],
    join: JoinPolicy,
    quorum: Option<usize>,
    vars: &mut Value,
) -> Result<()> {
    // Branches explicitly drop ordering among themselves:
    // each gets its own copy of the variable map and its own forked,
    // read-only context, runs concurrently, and each branch's variable
    // map is merged directly into the shared map keyed by its own branch
    // id — never nested under the parallel node's id, and never in
    // completion order.
    let prepared: Vec<_> = branches
        .iter()
        .map(|b| (b.id.clone(), b.entry_node.clone(), ctx.fork(), vars.clone()))
        .collect();

    let results = join_all(prepared.into_iter().map(
        |(branch_id, entry, branch_ctx, mut branch_vars)| async move {
            let outcome = run_from(&branch_ctx, &entry, &mut branch_vars).await;
            (branch_id, outcome, branch_vars)
        },
    ))
    .await;

    let successes = results.iter().filter(|(_, r, _)| r.is_ok()).count();
    let satisfied = match join {
        JoinPolicy::All => successes == branches.len(),
        JoinPolicy::Any => successes >= 1,
        JoinPolicy::Quorum => successes >= quorum.unwrap_or(branches.len()),
    };

    if !satisfied {
        let first_err = results
            .into_iter()
            .find_map(|(_, r, _)| r.err())
            .unwrap_or_else(|| AgentFlowError::validation("parallel branch failed"));
        return Err(first_err);
    }

    for (branch_id, outcome, branch_vars) in results {
        if outcome.is_ok() {
            insert_var(vars, &branch_id, branch_vars);
        }
    }
    Ok(())
}

fn insert_var(vars: &mut Value, key: &str, value: Value) {
    if let Some(obj) = vars.as_object_mut() {
        obj.insert(key.to_string(), value);
    }
}

/// Resolves `${a.b.c}` interpolations in `template` against `vars`.
pub fn interpolate(template: &str, vars: &Value, mode: InterpolationMode) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let path = &after[..end];
        let mut cur: &Value = vars;
        let mut found = true;
        for seg in path.split('.') {
            match cur.get(seg) {
                Some(v) => cur = v,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            out.push_str(&render_value(cur));
        } else if mode == InterpolationMode::Strict {
            return Err(AgentFlowError::validation(format!(
                "unresolved variable reference '${{{path}}}'"
            )));
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::*;
    use std::collections::HashMap;

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

    struct NoopCheckpoints;
    #[async_trait]
    impl CheckpointSink for NoopCheckpoints {
        async fn checkpoint(&self, _thread_id: &str, _step: u64, _vars: &Value) -> Result<()> {
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

    #[tokio::test]
    async fn parallel_fan_out_merges_both_outputs_regardless_of_order() {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), action_node("a", vec![]));
        nodes.insert("b".to_string(), action_node("b", vec![]));
        nodes.insert(
            "p".to_string(),
            Node {
                id: "p".into(),
                kind: NodeKind::Parallel {
                    branches: vec![
                        ParallelBranch {
                            id: "A".into(),
                            entry_node: "a".into(),
                        },
                        ParallelBranch {
                            id: "B".into(),
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
            entry: "p".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let steps = EchoSteps;
        let checkpoints = NoopCheckpoints;
        let subgraphs = NoSubgraphs;
        let runner = Runner::new(&workflow, &steps, &checkpoints, &subgraphs, "t1");
        let result = runner.run(Value::Object(Default::default())).await.unwrap();
        assert!(result.get("A").is_some());
        assert!(result.get("B").is_some());
        assert!(result.get("p").is_none());
    }

    #[tokio::test]
    async fn loop_respects_max_iterations() {
        let mut nodes = HashMap::new();
        nodes.insert("body".to_string(), action_node("body", vec![]));
        nodes.insert(
            "l".to_string(),
            Node {
                id: "l".into(),
                kind: NodeKind::Loop {
                    spec: LoopSpec {
                        body_entry: "body".into(),
                        max_iterations: Some(3),
                        while_expr: None,
                        hard_max_iterations: 100,
                    },
                    next: None,
                },
            },
        );
        let workflow = Workflow {
            id: "wf".into(),
            entry: "l".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let steps = EchoSteps;
        let checkpoints = NoopCheckpoints;
        let subgraphs = NoSubgraphs;
        let runner = Runner::new(&workflow, &steps, &checkpoints, &subgraphs, "t1");
        let result = runner.run(Value::Object(Default::default())).await.unwrap();
        assert_eq!(result.get("l.iteration").unwrap(), &Value::from(2));
    }

    #[tokio::test]
    async fn while_loop_hits_hard_ceiling() {
        let mut nodes = HashMap::new();
        nodes.insert("body".to_string(), action_node("body", vec![]));
        nodes.insert(
            "l".to_string(),
            Node {
                id: "l".into(),
                kind: NodeKind::Loop {
                    spec: LoopSpec {
                        body_entry: "body".into(),
                        max_iterations: None,
                        while_expr: Some("true".into()),
                        hard_max_iterations: 5,
                    },
                    next: None,
                },
            },
        );
        let workflow = Workflow {
            id: "wf".into(),
            entry: "l".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let steps = EchoSteps;
        let checkpoints = NoopCheckpoints;
        let subgraphs = NoSubgraphs;
        let runner = Runner::new(&workflow, &steps, &checkpoints, &subgraphs, "t1");
        let err = runner
            .run(Value::Object(Default::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::LoopOverflow);
    }

    #[test]
    fn interpolation_lenient_substitutes_empty() {
        let vars = serde_json::json!({"user": {"name": "ada"}});
        let out = interpolate("hi ${user.name}, ${missing}", &vars, InterpolationMode::Lenient)
            .unwrap();
        assert_eq!(out, "hi ada, ");
    }

    #[test]
    fn interpolation_strict_errors_on_missing() {
        let vars = serde_json::json!({});
        let err = interpolate("${missing}", &vars, InterpolationMode::Strict).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ValidationFailed);
    }
}
