use std::fmt;

use serde::{Deserialize, Serialize};

use pagepilot_core_types::ActionKind;

use crate::vocab;

/// Severity of a candidate action, used to decide whether confirmation is
/// mandatory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the gate knows about a candidate action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: Option<ActionKind>,
    /// Visible text of the element being acted on.
    pub target_text: Option<String>,
    /// Value payload (text being typed, option being selected).
    pub value: Option<String>,
    /// Registrable domain the action runs against.
    pub domain: Option<String>,
}

impl ActionDescriptor {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn with_target_text(mut self, text: impl Into<String>) -> Self {
        self.target_text = Some(text.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    fn vocab_haystack(&self) -> String {
        let mut parts = Vec::new();
        if let Some(action) = self.action {
            parts.push(action.name().to_string());
        }
        if let Some(text) = self.target_text.as_deref() {
            parts.push(text.to_string());
        }
        parts.join(" ")
    }
}

/// Pluggable text-heuristic boundary. Regex/keyword matching is inherently
/// heuristic; keeping it behind this trait lets a stronger model replace
/// it without touching the session machinery.
pub trait RiskClassifier: Send + Sync {
    /// Severity based on the action kind and target text alone.
    fn classify(&self, action: &ActionDescriptor) -> RiskLevel;

    /// Whether the value payload itself contains sensitive data,
    /// independent of the action kind.
    fn carries_sensitive_value(&self, action: &ActionDescriptor) -> bool;
}

/// Default keyword/pattern classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl RiskClassifier for KeywordClassifier {
    fn classify(&self, action: &ActionDescriptor) -> RiskLevel {
        let haystack = action.vocab_haystack();
        if vocab::contains_term(&haystack, vocab::FINANCIAL_TERMS) {
            return RiskLevel::Critical;
        }
        if vocab::contains_term(&haystack, vocab::DESTRUCTIVE_TERMS) {
            return RiskLevel::High;
        }
        match action.action {
            Some(ActionKind::Navigate) | Some(ActionKind::Type) => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    fn carries_sensitive_value(&self, action: &ActionDescriptor) -> bool {
        let Some(value) = action.value.as_deref() else {
            return false;
        };
        vocab::contains_term(value, vocab::SENSITIVE_TERMS)
            || vocab::CARD_NUMBER.is_match(value)
            || vocab::SSN.is_match(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn financial_vocabulary_is_critical() {
        let classifier = KeywordClassifier;
        let action = ActionDescriptor::new(ActionKind::Click).with_target_text("Buy now");
        assert_eq!(classifier.classify(&action), RiskLevel::Critical);

        let action = ActionDescriptor::new(ActionKind::Click).with_target_text("Proceed to Checkout");
        assert_eq!(classifier.classify(&action), RiskLevel::Critical);
    }

    #[test]
    fn destructive_vocabulary_is_high() {
        let classifier = KeywordClassifier;
        let action = ActionDescriptor::new(ActionKind::Click).with_target_text("Delete account");
        assert_eq!(classifier.classify(&action), RiskLevel::High);

        let action = ActionDescriptor::new(ActionKind::Click).with_target_text("Send message");
        assert_eq!(classifier.classify(&action), RiskLevel::High);
    }

    #[test]
    fn plain_actions_stay_low_or_medium() {
        let classifier = KeywordClassifier;
        let click = ActionDescriptor::new(ActionKind::Click).with_target_text("Next page");
        assert_eq!(classifier.classify(&click), RiskLevel::Low);

        let navigate = ActionDescriptor::new(ActionKind::Navigate);
        assert_eq!(classifier.classify(&navigate), RiskLevel::Medium);
    }

    #[test]
    fn sensitive_values_are_detected_by_keyword_and_pattern() {
        let classifier = KeywordClassifier;

        let keyword = ActionDescriptor::new(ActionKind::Type).with_value("my password is hunter2");
        assert!(classifier.carries_sensitive_value(&keyword));

        let card = ActionDescriptor::new(ActionKind::Type).with_value("4111 1111 1111 1111");
        assert!(classifier.carries_sensitive_value(&card));

        let ssn = ActionDescriptor::new(ActionKind::Type).with_value("123-45-6789");
        assert!(classifier.carries_sensitive_value(&ssn));

        let plain = ActionDescriptor::new(ActionKind::Type).with_value("hello world");
        assert!(!classifier.carries_sensitive_value(&plain));
    }
}
