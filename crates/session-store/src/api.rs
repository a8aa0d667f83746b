use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagepilot_core_types::TabId;
use session_core::Session;

use crate::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Checkpoint envelope written per tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub saved_at: DateTime<Utc>,
    pub session: Session,
}

impl SessionRecord {
    pub fn new(session: Session) -> Self {
        Self {
            saved_at: Utc::now(),
            session,
        }
    }
}

/// Key-value persistence keyed by tab identifier.
///
/// `save` replaces the previous checkpoint for the tab; `load` returns the
/// last acknowledged one. A missing tab is `Ok(None)`, an unreadable
/// checkpoint is an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> StoreResult<()>;
    async fn load(&self, tab: &TabId) -> StoreResult<Option<Session>>;
    async fn remove(&self, tab: &TabId) -> StoreResult<()>;
    async fn list_tabs(&self) -> StoreResult<Vec<TabId>>;
}
