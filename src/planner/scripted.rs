use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use pagepilot_core_types::PilotError;
use session_core::PlannerResponse;

use super::{PlanRequest, Planner};

/// Planner that replays a queue of canned responses, in order.
///
/// The workhorse for integration tests and demo transcripts: every
/// planning pass (initial or refine) pops the next response.
pub struct ScriptedPlanner {
    responses: Mutex<VecDeque<PlannerResponse>>,
    calls: Mutex<usize>,
}

impl ScriptedPlanner {
    pub fn new(responses: impl IntoIterator<Item = PlannerResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    /// Number of planning passes served so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _request: PlanRequest) -> Result<PlannerResponse, PilotError> {
        *self.calls.lock() += 1;
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| PilotError::new("scripted planner ran out of responses"))
    }
}
