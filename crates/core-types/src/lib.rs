use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the PagePilot session kernel crates.
#[derive(Debug, Error, Clone)]
pub enum PilotError {
    #[error("{message}")]
    Message { message: String },
}

impl PilotError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Opaque per-tab identifier; the unit of session isolation.
///
/// Callers that track browser tabs by integer can pass the integer through
/// `From<u64>`; fresh identifiers come from `TabId::new()`.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TabId(pub String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TabId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for TabId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Atomic page action vocabulary shared by plans and the risk gate.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Click,
    Type,
    Scroll,
    Select,
    Hover,
    Navigate,
    Wait,
}

impl ActionKind {
    /// Kinds that must name a captured element to act on.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ActionKind::Click | ActionKind::Type | ActionKind::Select | ActionKind::Hover
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Scroll => "scroll",
            ActionKind::Select => "select",
            ActionKind::Hover => "hover",
            ActionKind::Navigate => "navigate",
            ActionKind::Wait => "wait",
        }
    }

    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Click,
            ActionKind::Type,
            ActionKind::Scroll,
            ActionKind::Select,
            ActionKind::Hover,
            ActionKind::Navigate,
            ActionKind::Wait,
        ]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = PilotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "click" => Ok(ActionKind::Click),
            "type" => Ok(ActionKind::Type),
            "scroll" => Ok(ActionKind::Scroll),
            "select" => Ok(ActionKind::Select),
            "hover" => Ok(ActionKind::Hover),
            "navigate" => Ok(ActionKind::Navigate),
            "wait" => Ok(ActionKind::Wait),
            other => Err(PilotError::new(format!("unknown action kind '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_ids_are_unique() {
        assert_ne!(TabId::new(), TabId::new());
        assert_eq!(TabId::from(7u64), TabId::from("7"));
    }

    #[test]
    fn target_requirement_follows_kind() {
        assert!(ActionKind::Click.requires_target());
        assert!(ActionKind::Type.requires_target());
        assert!(ActionKind::Select.requires_target());
        assert!(ActionKind::Hover.requires_target());
        assert!(!ActionKind::Scroll.requires_target());
        assert!(!ActionKind::Navigate.requires_target());
        assert!(!ActionKind::Wait.requires_target());
    }

    #[test]
    fn action_kind_round_trips_through_names() {
        for kind in ActionKind::all() {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), *kind);
        }
        assert!("submit".parse::<ActionKind>().is_err());
    }
}
