use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{ActionDescriptor, KeywordClassifier, RiskClassifier, RiskLevel};
use crate::permissions::{DomainPermission, PermissionMode};

/// Why a confirmation decision came out the way it did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmReason {
    HighRiskAction,
    SensitiveData,
    NoSitePermission,
    UserPreference,
    ActionNotAllowed,
    AutonomousMode,
}

impl ConfirmReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmReason::HighRiskAction => "high-risk-action",
            ConfirmReason::SensitiveData => "sensitive-data",
            ConfirmReason::NoSitePermission => "no-site-permission",
            ConfirmReason::UserPreference => "user-preference",
            ConfirmReason::ActionNotAllowed => "action-not-allowed",
            ConfirmReason::AutonomousMode => "autonomous-mode",
        }
    }
}

impl fmt::Display for ConfirmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationDecision {
    pub required: bool,
    pub reason: ConfirmReason,
    pub risk_level: RiskLevel,
}

/// Decides whether a candidate action needs explicit user confirmation.
///
/// Checks run in a fixed priority order; the risk and sensitive-data rules
/// short-circuit before any permission lookup so a trusted domain cannot
/// bypass confirmation for dangerous actions.
#[derive(Clone)]
pub struct ConfirmationGate {
    classifier: Arc<dyn RiskClassifier>,
}

impl ConfirmationGate {
    pub fn new(classifier: Arc<dyn RiskClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classify(&self, action: &ActionDescriptor) -> RiskLevel {
        self.classifier.classify(action)
    }

    pub fn decide(
        &self,
        action: &ActionDescriptor,
        permission: Option<&DomainPermission>,
    ) -> ConfirmationDecision {
        let level = self.classifier.classify(action);

        let decision = if level >= RiskLevel::High {
            ConfirmationDecision {
                required: true,
                reason: ConfirmReason::HighRiskAction,
                risk_level: level,
            }
        } else if self.classifier.carries_sensitive_value(action) {
            ConfirmationDecision {
                required: true,
                reason: ConfirmReason::SensitiveData,
                risk_level: level.max(RiskLevel::High),
            }
        } else {
            match permission {
                None => ConfirmationDecision {
                    required: true,
                    reason: ConfirmReason::NoSitePermission,
                    risk_level: level,
                },
                Some(record) if record.mode == PermissionMode::Ask => ConfirmationDecision {
                    required: true,
                    reason: ConfirmReason::UserPreference,
                    risk_level: level,
                },
                Some(record) if !action.action.map(|kind| record.allows(kind)).unwrap_or(false) => {
                    ConfirmationDecision {
                        required: true,
                        reason: ConfirmReason::ActionNotAllowed,
                        risk_level: level,
                    }
                }
                Some(_) => ConfirmationDecision {
                    required: false,
                    reason: ConfirmReason::AutonomousMode,
                    risk_level: level,
                },
            }
        };

        debug!(
            required = decision.required,
            reason = %decision.reason,
            risk = %decision.risk_level,
            domain = action.domain.as_deref().unwrap_or("-"),
            "confirmation decision"
        );
        decision
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier))
    }
}
