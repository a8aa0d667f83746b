use async_trait::async_trait;
use dashmap::DashMap;

use pagepilot_core_types::TabId;
use session_core::Session;

use crate::api::{SessionRecord, SessionStore, StoreResult};

/// Process-local store for tests and single-run hosts. Satisfies the
/// write-then-acknowledge contract but obviously does not survive the
/// process.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: DashMap<TabId, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> StoreResult<()> {
        self.records
            .insert(session.tab_id.clone(), SessionRecord::new(session.clone()));
        Ok(())
    }

    async fn load(&self, tab: &TabId) -> StoreResult<Option<Session>> {
        Ok(self.records.get(tab).map(|entry| entry.session.clone()))
    }

    async fn remove(&self, tab: &TabId) -> StoreResult<()> {
        self.records.remove(tab);
        Ok(())
    }

    async fn list_tabs(&self) -> StoreResult<Vec<TabId>> {
        Ok(self.records.iter().map(|entry| entry.key().clone()).collect())
    }
}
