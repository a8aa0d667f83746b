use thiserror::Error;

use pagepilot_core_types::PilotError;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("io failure: {0}")]
    Io(String),
    #[error("checkpoint for tab {tab} is corrupt: {message}")]
    Corrupt { tab: String, message: String },
    #[error("encode failure: {0}")]
    Encode(String),
}

impl From<StoreError> for PilotError {
    fn from(value: StoreError) -> Self {
        PilotError::new(value.to_string())
    }
}
