//! Durable local persistence of the canonical state blob.
//!
//! The local store holds one serialized `AppState` under a fixed location.
//! Loads return the raw JSON value so the schema migrator can inspect and
//! upgrade blobs written by earlier application generations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::state::AppState;

/// Synchronous get/set of a single serialized state blob, plus an optional
/// cross-process change notification (another window of the same app
/// updating the same blob).
pub trait LocalStore: Send + Sync {
    /// Read the raw persisted blob, pre-migration. `None` when nothing has
    /// been persisted yet (or the blob is not JSON at all — the migrator
    /// seeds in both cases).
    fn load_raw(&self) -> Result<Option<Value>>;

    /// Persist the whole state. Must complete before a mutation is
    /// considered committed.
    fn save(&self, state: &AppState) -> Result<()>;

    /// Change notifications for writes made by other processes. `None` when
    /// the backend cannot observe external writes.
    fn changes(&self) -> Option<mpsc::UnboundedReceiver<()>> {
        None
    }
}

/// File-backed local store: one JSON document at a fixed path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location
    /// (`~/.config/weekquest/state.json`).
    pub fn at_default_location() -> Result<Self> {
        let path = crate::config::EngineConfig::default_state_path()
            .ok_or_else(|| EngineError::Config("cannot resolve config directory".to_owned()))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStore for JsonFileStore {
    fn load_raw(&self) -> Result<Option<Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::Local(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("state file {} is not JSON ({e})", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, state: &AppState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| EngineError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write via temp file + rename so a crash cannot leave a torn blob.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("persisted state to {}", self.path.display());
        Ok(())
    }
}

/// In-memory local store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryLocalStore {
    blob: Mutex<Option<Value>>,
    save_count: AtomicUsize,
    change_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Value) -> Self {
        let store = Self::default();
        *store.blob.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(blob);
        store
    }

    /// The last state saved through the engine, if any.
    pub fn saved_state(&self) -> Option<AppState> {
        self.blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Number of `save` calls observed.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Simulate another process writing the blob: replace it and fire the
    /// change notification.
    pub fn write_externally(&self, blob: Value) {
        *self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(blob);
        if let Some(tx) = self
            .change_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
        {
            let _ = tx.send(());
        }
    }
}

impl LocalStore for MemoryLocalStore {
    fn load_raw(&self) -> Result<Option<Value>> {
        Ok(self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save(&self, state: &AppState) -> Result<()> {
        let value =
            serde_json::to_value(state).map_err(|e| EngineError::Serialize(e.to_string()))?;
        *self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(value);
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn changes(&self) -> Option<mpsc::UnboundedReceiver<()>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .change_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);
        Some(rx)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::calendar;

    #[test]
    fn file_store_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        assert!(store.load_raw().unwrap().is_none());

        let state = AppState::seed(calendar::today());
        store.save(&state).unwrap();

        let raw = store.load_raw().unwrap().unwrap();
        let restored: AppState = serde_json::from_value(raw).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("deep").join("state.json"));

        store.save(&AppState::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn unparseable_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"definitely not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.load_raw().unwrap().is_none());
    }

    #[test]
    fn memory_store_counts_saves_and_notifies_external_writes() {
        let store = MemoryLocalStore::new();
        let mut changes = store.changes().unwrap();

        store.save(&AppState::default()).unwrap();
        store.save(&AppState::default()).unwrap();
        assert_eq!(store.save_count(), 2);

        store.write_externally(serde_json::json!({"parentPin": "0000"}));
        assert!(changes.try_recv().is_ok());
    }
}
