use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use pagepilot_core_types::ActionKind;

use crate::errors::GateError;

/// How much autonomy the user granted a domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Confirm every action on this domain.
    Ask,
    /// Allow-listed actions may run without confirmation.
    Autonomous,
}

/// Per-domain permission record, owned by the external permission store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainPermission {
    pub mode: PermissionMode,
    #[serde(default)]
    pub allowed_actions: Vec<ActionKind>,
    #[serde(default)]
    pub denied_actions: Vec<ActionKind>,
}

impl DomainPermission {
    pub fn ask() -> Self {
        Self {
            mode: PermissionMode::Ask,
            allowed_actions: Vec::new(),
            denied_actions: Vec::new(),
        }
    }

    pub fn autonomous(allowed_actions: Vec<ActionKind>) -> Self {
        Self {
            mode: PermissionMode::Autonomous,
            allowed_actions,
            denied_actions: Vec::new(),
        }
    }

    /// Whether `kind` is on the allow-list and not explicitly denied.
    pub fn allows(&self, kind: ActionKind) -> bool {
        !self.denied_actions.contains(&kind) && self.allowed_actions.contains(&kind)
    }
}

/// Domain-scoped permission persistence boundary.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_permission(&self, domain: &str) -> Result<Option<DomainPermission>, GateError>;
    async fn set_permission(
        &self,
        domain: &str,
        record: DomainPermission,
    ) -> Result<(), GateError>;
}

/// Process-local permission store.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    records: DashMap<String, DomainPermission>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(domain: &str) -> Result<String, GateError> {
    let trimmed = domain.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(GateError::InvalidDomain("empty domain".into()));
    }
    Ok(trimmed)
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get_permission(&self, domain: &str) -> Result<Option<DomainPermission>, GateError> {
        let key = normalize(domain)?;
        Ok(self.records.get(&key).map(|entry| entry.clone()))
    }

    async fn set_permission(
        &self,
        domain: &str,
        record: DomainPermission,
    ) -> Result<(), GateError> {
        let key = normalize(domain)?;
        self.records.insert(key, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_are_domain_scoped_and_case_insensitive() {
        let store = InMemoryPermissionStore::new();
        store
            .set_permission("Example.COM", DomainPermission::autonomous(vec![ActionKind::Click]))
            .await
            .unwrap();

        let record = store.get_permission("example.com").await.unwrap().unwrap();
        assert_eq!(record.mode, PermissionMode::Autonomous);
        assert!(record.allows(ActionKind::Click));
        assert!(!record.allows(ActionKind::Type));

        assert!(store.get_permission("other.com").await.unwrap().is_none());
        assert!(store.get_permission("  ").await.is_err());
    }
}
