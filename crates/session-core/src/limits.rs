use serde::{Deserialize, Serialize};

/// Tunable bounds for the dialogue loop.
///
/// The source constants (5 plan steps, 3 refine cycles, 0.5/0.9 confidence
/// bands) are defaults here, not hard-coded values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionLimits {
    /// Maximum number of steps a single plan may carry.
    pub max_plan_steps: usize,
    /// Maximum number of refine cycles before approval is forced.
    pub max_refine_iterations: u32,
    /// Below this overall confidence the agent asks instead of acting.
    pub ask_threshold: f64,
    /// At or above this overall confidence the plan proceeds directly.
    pub proceed_threshold: f64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_plan_steps: 5,
            max_refine_iterations: 3,
            ask_threshold: 0.5,
            proceed_threshold: 0.9,
        }
    }
}

impl SessionLimits {
    pub fn with_max_plan_steps(mut self, max_plan_steps: usize) -> Self {
        self.max_plan_steps = max_plan_steps;
        self
    }

    pub fn with_max_refine_iterations(mut self, max_refine_iterations: u32) -> Self {
        self.max_refine_iterations = max_refine_iterations;
        self
    }
}
