//! Risk classification and confirmation gating.
//!
//! Maps a candidate page action to a confirmation requirement. Risk and
//! sensitive-data checks run before any site-permission lookup, so a
//! trusted/autonomous domain can never wave a dangerous action through.
//! The text heuristics sit behind [`RiskClassifier`] so they can be
//! swapped or strengthened without touching the session machinery.

pub mod classifier;
pub mod confirm;
pub mod errors;
pub mod permissions;
mod vocab;

pub use classifier::{ActionDescriptor, KeywordClassifier, RiskClassifier, RiskLevel};
pub use confirm::{ConfirmReason, ConfirmationDecision, ConfirmationGate};
pub use errors::GateError;
pub use permissions::{
    DomainPermission, InMemoryPermissionStore, PermissionMode, PermissionStore,
};
