use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// One finished step of an approved plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedStep {
    pub step_index: usize,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-step progress ledger for an approved plan.
///
/// `total_steps` is snapshotted when execution starts and never mutated
/// afterwards; steps complete strictly in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionState {
    pub current_step_index: usize,
    pub total_steps: usize,
    pub completed_steps: Vec<CompletedStep>,
}

impl ExecutionState {
    /// Snapshot the tracker for a plan of `total_steps` steps.
    pub fn start(total_steps: usize) -> Self {
        Self {
            current_step_index: 0,
            total_steps,
            completed_steps: Vec::new(),
        }
    }

    /// Record completion of the step at `index`.
    ///
    /// `index` must equal the current cursor; anything else is an ordering
    /// error and leaves the ledger untouched.
    pub fn complete_step(
        &mut self,
        index: usize,
        result: impl Into<String>,
    ) -> Result<(), SessionError> {
        if index != self.current_step_index {
            return Err(SessionError::Ordering {
                expected: self.current_step_index,
                given: index,
            });
        }
        self.completed_steps.push(CompletedStep {
            step_index: index,
            result: result.into(),
            timestamp: Utc::now(),
        });
        self.current_step_index += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.current_step_index == self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_complete_in_order() {
        let mut tracker = ExecutionState::start(2);
        assert!(!tracker.is_complete());

        tracker.complete_step(0, "clicked").unwrap();
        tracker.complete_step(1, "typed").unwrap();
        assert!(tracker.is_complete());
        assert_eq!(tracker.completed_steps.len(), 2);
        assert_eq!(tracker.completed_steps[1].step_index, 1);
    }

    #[test]
    fn out_of_order_completion_is_rejected_without_mutation() {
        let mut tracker = ExecutionState::start(3);
        tracker.complete_step(0, "ok").unwrap();

        let err = tracker.complete_step(2, "skipped").unwrap_err();
        assert_eq!(err, SessionError::Ordering { expected: 1, given: 2 });
        assert_eq!(tracker.completed_steps.len(), 1);
        assert_eq!(tracker.current_step_index, 1);

        // Replaying an already-completed index is equally rejected.
        assert!(tracker.complete_step(0, "again").is_err());
        assert_eq!(tracker.completed_steps.len(), 1);
    }

    #[test]
    fn zero_step_plans_are_immediately_complete() {
        let tracker = ExecutionState::start(0);
        assert!(tracker.is_complete());
    }
}
