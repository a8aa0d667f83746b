use thiserror::Error;

use pagepilot_core_types::PilotError;

#[derive(Debug, Error, Clone)]
pub enum GateError {
    #[error("permission storage failed: {0}")]
    Storage(String),
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}

impl From<GateError> for PilotError {
    fn from(value: GateError) -> Self {
        PilotError::new(value.to_string())
    }
}
