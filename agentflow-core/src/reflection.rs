//! Reflection executor: execute -> critique -> refine, up to N iterations.
//!
//! A bounded loop with accumulated history, the same shape as a retry
//! policy but driving a critique loop instead of a backoff delay.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Correlation ids carried unchanged through every iteration of a
/// reflection run. Refinement rewrites the prompt; it never touches who
/// or what the run is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionContext {
    pub trace_id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
}

/// The agent capability under reflection: takes an input, produces output.
/// Kept trait-object friendly so the workflow engine never imports a
/// concrete agent type, avoiding a cyclic dependency on the workflow crate.
#[async_trait]
pub trait ReflectableAgent: Send + Sync {
    async fn run(&self, input: &str, context: &ReflectionContext) -> Result<String>;
}

/// The critic: scores an output on a 0-10 scale and lists issues.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(&self, output: &str, context: &ReflectionContext) -> Result<String>;
}

/// One parsed critique round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    pub score: f32,
    pub raw: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// The result of a reflection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub output: String,
    pub improved_by_reflection: bool,
    pub iterations: usize,
    pub history: Vec<Critique>,
}

#[derive(Debug, Clone)]
pub struct ReflectionConfig {
    pub max_iterations: usize,
    pub quality_threshold: f32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_threshold: 8.0,
        }
    }
}

/// Best-effort critique parser. Canonical form is `score: X/10`; falls back
/// to scanning for a leading float; unparseable critiques default to 0.5
/// loop.
pub fn parse_critique(raw: &str) -> Critique {
    let lower = raw.to_ascii_lowercase();
    let score = if let Some(idx) = lower.find("score:") {
        let rest = &lower[idx + "score:".len()..];
        scan_leading_float(rest).unwrap_or(0.5)
    } else {
        scan_leading_float(&lower).unwrap_or(0.5)
    };

    let issues = extract_bulleted(raw, "issue");
    let suggestions = extract_bulleted(raw, "suggestion");

    Critique {
        score,
        raw: raw.to_string(),
        issues,
        suggestions,
    }
}

fn scan_leading_float(s: &str) -> Option<f32> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    s[..end].parse::<f32>().ok()
}

fn extract_bulleted(raw: &str, keyword: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| line.to_ascii_lowercase().contains(keyword))
        .map(|line| line.trim_start_matches(['-', '*', ' ']).to_string())
        .collect()
}

/// Runs the execute -> critique -> refine loop. `context` is passed to every
/// `run`/`critique` call unchanged across iterations: refinement rewrites
/// the prompt, never who or what the run is attributed to.
pub async fn run_reflection(
    agent: &dyn ReflectableAgent,
    critic: &dyn Critic,
    initial_input: &str,
    context: &ReflectionContext,
    config: &ReflectionConfig,
) -> ReflectionResult {
    let mut input = initial_input.to_string();
    let mut history = Vec::new();
    let mut output = String::new();

    for iteration in 1..=config.max_iterations {
        output = match agent.run(&input, context).await {
            Ok(o) => o,
            Err(_) => {
                return ReflectionResult {
                    output,
                    improved_by_reflection: iteration > 1,
                    iterations: iteration,
                    history,
                };
            }
        };

        let critique_raw = match critic.critique(&output, context).await {
            Ok(raw) => raw,
            Err(_) => {
                // critic call failed: return the current output unrefined.
                return ReflectionResult {
                    output,
                    improved_by_reflection: iteration > 1,
                    iterations: iteration,
                    history,
                };
            }
        };

        let critique = parse_critique(&critique_raw);
        let accepted = critique.score >= config.quality_threshold;
        debug!(iteration, score = critique.score, accepted, "reflection critique");
        history.push(critique.clone());

        if accepted {
            return ReflectionResult {
                output,
                improved_by_reflection: iteration > 1,
                iterations: iteration,
                history,
            };
        }

        input = refine_prompt(initial_input, &critique);
    }

    ReflectionResult {
        output,
        improved_by_reflection: config.max_iterations > 1,
        iterations: config.max_iterations,
        history,
    }
}

fn refine_prompt(original: &str, critique: &Critique) -> String {
    let mut prompt = format!("{original}\n\nPrevious attempt had issues:\n");
    for issue in &critique.issues {
        prompt.push_str(&format!("- {issue}\n"));
    }
    if !critique.suggestions.is_empty() {
        prompt.push_str("Suggestions:\n");
        for s in &critique.suggestions {
            prompt.push_str(&format!("- {s}\n"));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAgent(&'static str);
    #[async_trait]
    impl ReflectableAgent for FixedAgent {
        async fn run(&self, _input: &str, _context: &ReflectionContext) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FixedCritic(&'static str);
    #[async_trait]
    impl Critic for FixedCritic {
        async fn critique(&self, _output: &str, _context: &ReflectionContext) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn accepts_on_first_pass() {
        let agent = FixedAgent("done");
        let critic = FixedCritic("score: 9/10, looks great");
        let result = run_reflection(
            &agent,
            &critic,
            "do the thing",
            &ReflectionContext::default(),
            &ReflectionConfig::default(),
        )
        .await;
        assert_eq!(result.output, "done");
        assert!(!result.improved_by_reflection);
        assert_eq!(result.history.len(), 1);
    }

    /// Records every context it was called with, so the caller can assert
    /// it never changed across iterations.
    struct ImprovingAgent {
        calls: AtomicUsize,
        seen_contexts: std::sync::Mutex<Vec<ReflectionContext>>,
    }
    #[async_trait]
    impl ReflectableAgent for ImprovingAgent {
        async fn run(&self, _input: &str, context: &ReflectionContext) -> Result<String> {
            self.seen_contexts.lock().unwrap().push(context.clone());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("attempt-{n}"))
        }
    }

    struct ScoreSequenceCritic {
        scores: std::sync::Mutex<Vec<&'static str>>,
        seen_contexts: std::sync::Mutex<Vec<ReflectionContext>>,
    }
    #[async_trait]
    impl Critic for ScoreSequenceCritic {
        async fn critique(&self, _output: &str, context: &ReflectionContext) -> Result<String> {
            self.seen_contexts.lock().unwrap().push(context.clone());
            let mut seq = self.scores.lock().unwrap();
            Ok(seq.remove(0).to_string())
        }
    }

    #[tokio::test]
    async fn refines_until_threshold_then_accepts() {
        let agent = ImprovingAgent {
            calls: AtomicUsize::new(0),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let critic = ScoreSequenceCritic {
            scores: std::sync::Mutex::new(vec![
                "score: 4/10 - issue: too terse",
                "score: 9/10 - great",
            ]),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let result = run_reflection(
            &agent,
            &critic,
            "start",
            &ReflectionContext::default(),
            &ReflectionConfig::default(),
        )
        .await;
        assert_eq!(result.iterations, 2);
        assert!(result.improved_by_reflection);
        assert_eq!(result.history.len(), 2);
    }

    #[tokio::test]
    async fn returns_last_output_when_max_iterations_reached() {
        let agent = ImprovingAgent {
            calls: AtomicUsize::new(0),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let critic = ScoreSequenceCritic {
            scores: std::sync::Mutex::new(vec!["score: 2/10", "score: 3/10", "score: 4/10"]),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let config = ReflectionConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        };
        let result = run_reflection(
            &agent,
            &critic,
            "start",
            &ReflectionContext::default(),
            &config,
        )
        .await;
        assert_eq!(result.iterations, 3);
        assert_eq!(result.history.len(), 3);
    }

    #[tokio::test]
    async fn context_is_unchanged_across_refinement_iterations() {
        let context = ReflectionContext {
            trace_id: Some("trace-1".into()),
            tenant_id: Some("tenant-1".into()),
            user_id: Some("user-1".into()),
            channel_id: Some("channel-1".into()),
        };
        let agent = ImprovingAgent {
            calls: AtomicUsize::new(0),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let critic = ScoreSequenceCritic {
            scores: std::sync::Mutex::new(vec!["score: 2/10", "score: 3/10", "score: 9/10"]),
            seen_contexts: std::sync::Mutex::new(Vec::new()),
        };
        let config = ReflectionConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        };
        run_reflection(&agent, &critic, "start", &context, &config).await;

        for seen in agent.seen_contexts.lock().unwrap().iter() {
            assert_eq!(seen, &context);
        }
        for seen in critic.seen_contexts.lock().unwrap().iter() {
            assert_eq!(seen, &context);
        }
    }

    #[test]
    fn critique_parsing_falls_back_to_default() {
        let c = parse_critique("no numeric content here");
        assert_eq!(c.score, 0.5);
    }
}
