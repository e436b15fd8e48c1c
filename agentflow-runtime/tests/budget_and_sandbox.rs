use agentflow_runtime::{BudgetDecision, BudgetLimits, BudgetManager};
use agentflow_runtime::{SandboxBackend, SandboxExecutor, SandboxLimits, SandboxOutput, SandboxRequest};
use agentflow_runtime::{Result, RuntimeError};
use async_trait::async_trait;
use std::time::Duration;

/// Crosses the minute-token ceiling, confirms the throttle arms, and
/// confirms it clears once the throttle window elapses — all through the
/// public `BudgetManager` surface, with no knowledge of its internal
/// window bookkeeping.
#[test]
fn throttle_arms_on_minute_overage_and_clears_after_delay() {
    let limits = BudgetLimits {
        per_minute_tokens: 500,
        auto_throttle: true,
        throttle_delay: Duration::from_millis(1),
        ..BudgetLimits::default()
    };
    let mgr = BudgetManager::new(limits);

    mgr.record_usage(500, 0.0);
    let decision = mgr.check_budget(1, 0.0);
    assert_eq!(decision, BudgetDecision::WindowExceeded { window: "minute" });

    let throttled = mgr.check_budget(1, 0.0);
    assert!(matches!(throttled, BudgetDecision::Throttled { .. }));

    std::thread::sleep(Duration::from_millis(5));
    let decision_after_delay = mgr.check_budget(1, 0.0);
    assert_eq!(decision_after_delay, BudgetDecision::Allowed);
}

struct SleepyBackend(Duration);
#[async_trait]
impl SandboxBackend for SleepyBackend {
    async fn run(&self, request: &SandboxRequest) -> Result<SandboxOutput> {
        tokio::time::sleep(self.0).await;
        Ok(SandboxOutput {
            stdout: request.command.clone().into_bytes(),
            stderr: Vec::new(),
            exit_code: 0,
            truncated: false,
        })
    }
}

/// Runs a command that completes within the deadline and checks that
/// output past the byte ceiling is truncated, then runs one that blows
/// the deadline and checks it surfaces as a timeout rather than hanging.
#[tokio::test(start_paused = true)]
async fn sandbox_truncates_then_times_out_on_a_slow_backend() {
    let fast = SandboxExecutor::new(
        SleepyBackend(Duration::from_millis(1)),
        SandboxLimits {
            timeout: Duration::from_secs(5),
            max_output_bytes: 4,
        },
    );
    let output = fast
        .execute(SandboxRequest {
            command: "0123456789".into(),
            args: vec![],
            input: None,
        })
        .await
        .unwrap();
    assert_eq!(output.stdout, b"0123");
    assert!(output.truncated);

    let slow = SandboxExecutor::new(
        SleepyBackend(Duration::from_secs(30)),
        SandboxLimits {
            timeout: Duration::from_millis(50),
            max_output_bytes: 1024,
        },
    );
    let result = slow
        .execute(SandboxRequest {
            command: "anything".into(),
            args: vec![],
            input: None,
        })
        .await;
    assert!(matches!(result, Err(RuntimeError::SandboxTimeout(_))));
}
