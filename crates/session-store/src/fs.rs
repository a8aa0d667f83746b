use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use pagepilot_core_types::TabId;
use session_core::Session;

use crate::api::{SessionRecord, SessionStore, StoreResult};
use crate::errors::StoreError;

/// One JSON checkpoint file per tab under a root directory.
///
/// Writes go through a temp file + rename so a crash mid-write can never
/// clobber the last acknowledged checkpoint.
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, tab: &TabId) -> PathBuf {
        let safe: String = tab
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("session-{safe}.json"))
    }

    fn read_record(&self, path: &Path, tab_label: &str) -> StoreResult<SessionRecord> {
        let data = fs::read(path).map_err(|err| StoreError::Io(err.to_string()))?;
        serde_json::from_slice(&data).map_err(|err| StoreError::Corrupt {
            tab: tab_label.to_string(),
            message: err.to_string(),
        })
    }
}

fn write_atomic(path: PathBuf, data: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(tmp, &path)?;
    Ok(path)
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn save(&self, session: &Session) -> StoreResult<()> {
        let record = SessionRecord::new(session.clone());
        let data =
            serde_json::to_vec_pretty(&record).map_err(|err| StoreError::Encode(err.to_string()))?;
        write_atomic(self.record_path(&session.tab_id), &data)
            .map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(())
    }

    async fn load(&self, tab: &TabId) -> StoreResult<Option<Session>> {
        let path = self.record_path(tab);
        if !path.exists() {
            return Ok(None);
        }
        let record = self.read_record(&path, &tab.0)?;
        Ok(Some(record.session))
    }

    async fn remove(&self, tab: &TabId) -> StoreResult<()> {
        let path = self.record_path(tab);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }

    async fn list_tabs(&self) -> StoreResult<Vec<TabId>> {
        let mut tabs = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|err| StoreError::Io(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::Io(err.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path, &path.to_string_lossy()) {
                Ok(record) => tabs.push(record.session.tab_id),
                Err(err) => {
                    // A single corrupt file must not hide every other tab.
                    warn!(path = %path.display(), %err, "skipping unreadable checkpoint");
                }
            }
        }
        Ok(tabs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use session_core::{SessionLimits, SessionStatus};

    #[tokio::test]
    async fn checkpoints_survive_a_new_store_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tab = TabId::from("42");

        {
            let store = FsSessionStore::new(dir.path()).unwrap();
            let mut session = Session::new(tab.clone(), &SessionLimits::default());
            session.current_task = Some("Click the Login button".into());
            session.status = SessionStatus::Planning;
            store.save(&session).await.unwrap();
        }

        // Fresh instance over the same root, as after a host restart.
        let store = FsSessionStore::new(dir.path()).unwrap();
        let loaded = store.load(&tab).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Planning);
        assert_eq!(loaded.current_task.as_deref(), Some("Click the Login button"));
        assert_eq!(store.list_tabs().await.unwrap(), vec![tab.clone()]);

        store.remove(&tab).await.unwrap();
        assert!(store.load(&tab).await.unwrap().is_none());
        // Removing a missing tab is not an error.
        store.remove(&tab).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_checkpoint_surfaces_as_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSessionStore::new(dir.path()).unwrap();
        let tab = TabId::from("7");

        fs::write(store.record_path(&tab), b"{ not json").unwrap();
        let err = store.load(&tab).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn saves_replace_the_previous_checkpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSessionStore::new(dir.path()).unwrap();
        let tab = TabId::from("3");

        let mut session = Session::new(tab.clone(), &SessionLimits::default());
        store.save(&session).await.unwrap();
        session.status = SessionStatus::Planning;
        store.save(&session).await.unwrap();

        let loaded = store.load(&tab).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Planning);
        assert_eq!(store.list_tabs().await.unwrap().len(), 1);
    }
}
