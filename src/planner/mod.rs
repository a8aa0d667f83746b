mod heuristic;
mod scripted;

use async_trait::async_trait;

use pagepilot_core_types::PilotError;
use session_core::{ConversationTurn, PageContext, PlannerResponse};

pub use heuristic::HeuristicPlanner;
pub use scripted::ScriptedPlanner;

/// Everything a planner gets to see for one planning pass.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// The active natural-language task.
    pub task: String,
    /// Page context captured at submission, if any.
    pub page: Option<PageContext>,
    /// Full dialogue so far, oldest first.
    pub history: Vec<ConversationTurn>,
}

/// Reasoning backend boundary.
///
/// Implementations must keep every confidence field in `[0, 1]`, pair
/// `understood = false` with at least one clarifying question and emit
/// between one and the configured maximum of steps otherwise; responses
/// are re-validated at the session boundary either way.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: PlanRequest) -> Result<PlannerResponse, PilotError>;
}
