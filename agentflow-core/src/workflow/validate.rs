//! Static DSL validation: referential integrity and per-kind structural
//! requirements.

use super::graph::{NodeKind, Workflow};
use crate::condition::Expr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue(pub String);

pub fn validate(workflow: &Workflow) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !workflow.nodes.contains_key(&workflow.entry) {
        issues.push(ValidationIssue(format!(
            "entry node '{}' does not exist",
            workflow.entry
        )));
    }

    for (id, node) in &workflow.nodes {
        match &node.kind {
            NodeKind::Action { next, .. } => {
                check_refs(workflow, id, next, &mut issues);
            }
            NodeKind::Condition {
                expression,
                on_true,
                on_false,
            } => {
                if expression.trim().is_empty() {
                    issues.push(ValidationIssue(format!(
                        "condition node '{id}' is missing an expression"
                    )));
                } else if let Err(e) = Expr::parse(expression) {
                    issues.push(ValidationIssue(format!(
                        "condition node '{id}' has an invalid expression: {e}"
                    )));
                }
                check_refs(workflow, id, std::slice::from_ref(on_true), &mut issues);
                check_refs(workflow, id, std::slice::from_ref(on_false), &mut issues);
            }
            NodeKind::Loop { spec, next } => {
                if spec.while_expr.is_none() && spec.max_iterations.is_none() {
                    issues.push(ValidationIssue(format!(
                        "loop node '{id}' needs either max_iterations (for) or while_expr (while)"
                    )));
                }
                if let Some(max) = spec.max_iterations {
                    if max == 0 {
                        issues.push(ValidationIssue(format!(
                            "loop node '{id}' must have a positive max_iterations"
                        )));
                    }
                }
                if let Some(expr) = &spec.while_expr {
                    if let Err(e) = Expr::parse(expr) {
                        issues.push(ValidationIssue(format!(
                            "loop node '{id}' has an invalid while_expr: {e}"
                        )));
                    }
                }
                if !workflow.nodes.contains_key(&spec.body_entry) {
                    issues.push(ValidationIssue(format!(
                        "loop node '{id}' body_entry '{}' does not exist",
                        spec.body_entry
                    )));
                }
                if let Some(n) = next {
                    check_refs(workflow, id, std::slice::from_ref(n), &mut issues);
                }
            }
            NodeKind::Parallel {
                branches,
                join,
                quorum,
                next,
            } => {
                if branches.is_empty() {
                    issues.push(ValidationIssue(format!(
                        "parallel node '{id}' must declare at least one branch"
                    )));
                }
                for b in branches {
                    if !workflow.nodes.contains_key(&b.entry_node) {
                        issues.push(ValidationIssue(format!(
                            "parallel node '{id}' branch '{}' entry '{}' does not exist",
                            b.id, b.entry_node
                        )));
                    }
                }
                if matches!(join, super::graph::JoinPolicy::Quorum) && quorum.is_none() {
                    issues.push(ValidationIssue(format!(
                        "parallel node '{id}' uses quorum join but sets no quorum count"
                    )));
                }
                if let Some(n) = next {
                    check_refs(workflow, id, std::slice::from_ref(n), &mut issues);
                }
            }
            NodeKind::Subgraph { workflow: wf_name, next } => {
                if !workflow.subgraphs.contains_key(wf_name) {
                    issues.push(ValidationIssue(format!(
                        "subgraph node '{id}' references unknown workflow '{wf_name}'"
                    )));
                }
                if let Some(n) = next {
                    check_refs(workflow, id, std::slice::from_ref(n), &mut issues);
                }
            }
            NodeKind::Checkpoint { next } => {
                if let Some(n) = next {
                    check_refs(workflow, id, std::slice::from_ref(n), &mut issues);
                }
            }
        }
    }

    issues
}

fn check_refs(workflow: &Workflow, from: &str, targets: &[String], issues: &mut Vec<ValidationIssue>) {
    for target in targets {
        if !workflow.nodes.contains_key(target) {
            issues.push(ValidationIssue(format!(
                "node '{from}' references missing node '{target}'"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::*;
    use std::collections::HashMap;

    fn action(next: Vec<&str>) -> Node {
        Node {
            id: "n".into(),
            kind: NodeKind::Action {
                step: StepRef::Named("noop".into()),
                next: next.into_iter().map(String::from).collect(),
            },
        }
    }

    #[test]
    fn missing_entry_is_reported() {
        let wf = Workflow {
            id: "wf".into(),
            entry: "start".into(),
            nodes: HashMap::new(),
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let issues = validate(&wf);
        assert!(issues.iter().any(|i| i.0.contains("entry")));
    }

    #[test]
    fn dangling_next_reference_is_reported() {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), action(vec!["ghost"]));
        let wf = Workflow {
            id: "wf".into(),
            entry: "a".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let issues = validate(&wf);
        assert!(issues.iter().any(|i| i.0.contains("ghost")));
    }

    #[test]
    fn condition_requires_expression() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "c".to_string(),
            Node {
                id: "c".into(),
                kind: NodeKind::Condition {
                    expression: "".into(),
                    on_true: "a".into(),
                    on_false: "a".into(),
                },
            },
        );
        nodes.insert("a".to_string(), action(vec![]));
        let wf = Workflow {
            id: "wf".into(),
            entry: "c".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        let issues = validate(&wf);
        assert!(issues.iter().any(|i| i.0.contains("missing an expression")));
    }

    #[test]
    fn valid_workflow_has_no_issues() {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), action(vec![]));
        let wf = Workflow {
            id: "wf".into(),
            entry: "a".into(),
            nodes,
            variables: HashMap::new(),
            subgraphs: HashMap::new(),
            config: Default::default(),
        };
        assert!(validate(&wf).is_empty());
    }
}
