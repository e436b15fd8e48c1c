use agentflow_core::reflection::{
    Critic, ReflectableAgent, ReflectionConfig, ReflectionContext, run_reflection,
};
use agentflow_core::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// An agent that improves its answer each call but only if it's handed
/// the same correlation ids it started with.
struct ContextCheckingAgent {
    expected: ReflectionContext,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReflectableAgent for ContextCheckingAgent {
    async fn run(&self, input: &str, context: &ReflectionContext) -> Result<String> {
        assert_eq!(context, &self.expected, "context drifted across reflection iterations");
        self.calls.lock().unwrap().push(input.to_string());
        Ok(format!("answer for: {input}"))
    }
}

struct ContextCheckingCritic {
    expected: ReflectionContext,
    scores: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Critic for ContextCheckingCritic {
    async fn critique(&self, _output: &str, context: &ReflectionContext) -> Result<String> {
        assert_eq!(context, &self.expected, "context drifted across reflection iterations");
        Ok(self.scores.lock().unwrap().remove(0).to_string())
    }
}

/// Exercises the full execute -> critique -> refine loop from outside the
/// crate, confirming trace/tenant/user/channel ids survive every
/// refinement round unchanged.
#[tokio::test]
async fn correlation_ids_survive_every_refinement_round() {
    let context = ReflectionContext {
        trace_id: Some("trace-42".into()),
        tenant_id: Some("acme".into()),
        user_id: Some("u-1".into()),
        channel_id: Some("slack".into()),
    };

    let agent = ContextCheckingAgent {
        expected: context.clone(),
        calls: Mutex::new(Vec::new()),
    };
    let critic = ContextCheckingCritic {
        expected: context.clone(),
        scores: Mutex::new(vec!["score: 3/10 - issue: vague", "score: 9/10 - issue: none"]),
    };

    let result = run_reflection(
        &agent,
        &critic,
        "draft a release note",
        &context,
        &ReflectionConfig::default(),
    )
    .await;

    assert_eq!(result.iterations, 2);
    assert!(result.improved_by_reflection);
    assert_eq!(agent.calls.lock().unwrap().len(), 2);
}
