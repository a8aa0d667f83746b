use thiserror::Error;

use pagepilot_core_types::PilotError;

use crate::model::SessionStatus;

/// Errors emitted by the session kernel.
///
/// All variants are rejected before any state mutation takes place, so a
/// failed operation always leaves the session exactly as it was.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// Malformed plan or confidence input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Step completion arrived out of sequence.
    #[error("step {given} completed out of order (expected {expected})")]
    Ordering { expected: usize, given: usize },

    /// The requested transition is illegal in the current status.
    #[error("operation '{op}' is not allowed while session is {status}")]
    Transition {
        op: &'static str,
        status: SessionStatus,
    },
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transition(op: &'static str, status: SessionStatus) -> Self {
        Self::Transition { op, status }
    }
}

impl From<SessionError> for PilotError {
    fn from(value: SessionError) -> Self {
        PilotError::new(value.to_string())
    }
}
