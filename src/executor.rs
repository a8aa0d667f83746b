use async_trait::async_trait;
use tracing::info;

use pagepilot_core_types::PilotError;
use session_core::PlanStep;

/// Outcome of dispatching one plan step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub success: bool,
    pub result: String,
}

impl StepResult {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
        }
    }

    pub fn failed(result: impl Into<String>) -> Self {
        Self {
            success: false,
            result: result.into(),
        }
    }
}

/// Low-level action dispatch boundary (click/type/scroll live elsewhere).
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, step: &PlanStep) -> Result<StepResult, PilotError>;
}

/// Executor that pretends every action worked; demo and test stand-in.
/// Optionally fails at one configured step index to exercise the failure
/// path.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    fail_at: Option<usize>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(step_index: usize) -> Self {
        Self {
            fail_at: Some(step_index),
        }
    }
}

#[async_trait]
impl ActionExecutor for SimulatedExecutor {
    async fn execute(&self, step: &PlanStep) -> Result<StepResult, PilotError> {
        if self.fail_at == Some(step.step - 1) {
            return Ok(StepResult::failed(format!(
                "simulated failure at step {}",
                step.step
            )));
        }
        let target = step
            .target_description
            .as_deref()
            .or(step.target_id.as_deref())
            .unwrap_or("-");
        info!(step = step.step, action = %step.action, target, "simulated dispatch");
        Ok(StepResult::ok(format!("simulated {} on {}", step.action, target)))
    }
}
