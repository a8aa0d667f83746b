use async_trait::async_trait;
use tracing::{info, warn};

use risk_gate::ConfirmationDecision;
use session_core::PlanStep;

/// Where required confirmations get resolved. In the extension this is
/// the user-facing dialog; the CLI ships policy stand-ins.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// `true` approves the step, `false` declines it (which cancels the
    /// run).
    async fn confirm(&self, step: &PlanStep, decision: &ConfirmationDecision) -> bool;
}

/// Fixed-answer prompt for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    approve: bool,
}

impl AutoConfirm {
    pub fn approve_all() -> Self {
        Self { approve: true }
    }

    pub fn deny_all() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ConfirmationPrompt for AutoConfirm {
    async fn confirm(&self, step: &PlanStep, decision: &ConfirmationDecision) -> bool {
        if self.approve {
            info!(
                step = step.step,
                action = %step.action,
                reason = %decision.reason,
                risk = %decision.risk_level,
                "auto-approving confirmation"
            );
        } else {
            warn!(
                step = step.step,
                action = %step.action,
                reason = %decision.reason,
                "declining confirmation"
            );
        }
        self.approve
    }
}
