use std::fmt;

use thiserror::Error;

use session_core::{SessionError, SessionStatus};

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalStage {
    Planner,
    Executor,
    Store,
    Permissions,
}

impl fmt::Display for ExternalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalStage::Planner => "planner",
            ExternalStage::Executor => "executor",
            ExternalStage::Store => "session store",
            ExternalStage::Permissions => "permission store",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the session center.
///
/// Structural errors come straight from the kernel and were rejected
/// before any mutation. External failures carry the last-known-good
/// context (status, plan version) so the caller can decide whether to
/// retry the external call; the center itself never retries.
#[derive(Debug, Error)]
pub enum CenterError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{stage} call failed while {} (last plan {}): {message}", status_label(.status), plan_label(.plan_version))]
    External {
        stage: ExternalStage,
        message: String,
        status: Option<SessionStatus>,
        plan_version: Option<u32>,
    },
}

fn status_label(status: &Option<SessionStatus>) -> &'static str {
    status.map(|s| s.name()).unwrap_or("status unknown")
}

fn plan_label(version: &Option<u32>) -> String {
    version
        .map(|v| format!("v{v}"))
        .unwrap_or_else(|| "none".into())
}

impl CenterError {
    pub fn external(
        stage: ExternalStage,
        message: impl fmt::Display,
        status: Option<SessionStatus>,
        plan_version: Option<u32>,
    ) -> Self {
        Self::External {
            stage,
            message: message.to_string(),
            status,
            plan_version,
        }
    }
}
