//! Remote store boundary: a queryable, upsertable, subscribable data
//! service shared across a household's devices.
//!
//! The engine exchanges whole `AppState` documents with the remote —
//! partial/per-field writes are not part of this design. Change
//! notifications are at-most-informative: duplicates and misses are
//! tolerated, and the engine's own writes come back as notifications too
//! (hence echo suppression in the engine).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::{EngineError, Result};
use crate::state::AppState;

/// Transport-level connectivity, distinct from the engine's sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// A change notification from the remote store. Carries no payload — the
/// engine always re-pulls the full state.
#[derive(Debug, Clone, Copy)]
pub enum RemoteEvent {
    Changed,
}

/// The shared remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the full remote state. `Ok(None)` means the remote holds no
    /// state for this household yet. Partial backend failure must surface
    /// as `Err` — the engine never applies a partially-reconstructed state.
    async fn pull_full_state(&self) -> Result<Option<AppState>>;

    /// Upsert the full state, including reflecting deletions of removed
    /// entities.
    async fn push_full_state(&self, state: &AppState) -> Result<()>;

    /// Change notifications, regardless of origin (including this engine's
    /// own writes). Not exactly-once, not ordered.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteEvent>;

    /// Transport connectivity as a watchable value.
    fn connection_status(&self) -> watch::Receiver<ConnectionStatus>;
}

/// In-process remote store for tests and offline operation.
///
/// Tests drive it directly: seed a state, flip connectivity, emit change
/// notifications, inspect push/pull counters.
pub struct MemoryRemoteStore {
    state: Mutex<Option<AppState>>,
    pull_count: AtomicUsize,
    push_count: AtomicUsize,
    fail_pulls: AtomicBool,
    fail_pushes: AtomicBool,
    event_tx: Mutex<Option<mpsc::UnboundedSender<RemoteEvent>>>,
    conn_tx: watch::Sender<ConnectionStatus>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        let (conn_tx, _) = watch::channel(ConnectionStatus::Connected);
        Self {
            state: Mutex::new(None),
            pull_count: AtomicUsize::new(0),
            push_count: AtomicUsize::new(0),
            fail_pulls: AtomicBool::new(false),
            fail_pushes: AtomicBool::new(false),
            event_tx: Mutex::new(None),
            conn_tx,
        }
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote that already holds `state` (another device seeded it).
    pub fn with_state(state: AppState) -> Self {
        let store = Self::default();
        *store
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(state);
        store
    }

    /// Replace the remote-side state as another device would, without
    /// touching the push counter.
    pub fn push_state_directly(&self, state: AppState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(state);
    }

    /// Current remote-side state.
    pub fn remote_state(&self) -> Option<AppState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn pull_count(&self) -> usize {
        self.pull_count.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.push_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_pulls(&self, fail: bool) {
        self.fail_pulls.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Flip transport connectivity.
    pub fn set_connected(&self, connected: bool) {
        let status = if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        self.conn_tx.send_replace(status);
    }

    /// Fire a change notification at the subscriber, as the backend would
    /// after any device's write.
    pub fn emit_change(&self) {
        if let Some(tx) = self
            .event_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
        {
            let _ = tx.send(RemoteEvent::Changed);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn pull_full_state(&self) -> Result<Option<AppState>> {
        self.pull_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_pulls.load(Ordering::SeqCst) {
            return Err(EngineError::Remote("simulated pull failure".to_owned()));
        }
        Ok(self.remote_state())
    }

    async fn push_full_state(&self, state: &AppState) -> Result<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(EngineError::Remote("simulated push failure".to_owned()));
        }
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(state.clone());
        self.push_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .event_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);
        rx
    }

    fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.conn_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::calendar;

    #[tokio::test]
    async fn memory_remote_round_trips_state() {
        let store = MemoryRemoteStore::new();
        assert!(store.pull_full_state().await.unwrap().is_none());

        let state = AppState::seed(calendar::today());
        store.push_full_state(&state).await.unwrap();

        let pulled = store.pull_full_state().await.unwrap().unwrap();
        assert_eq!(pulled, state);
        assert_eq!(store.push_count(), 1);
        assert_eq!(store.pull_count(), 2);
    }

    #[tokio::test]
    async fn simulated_failures_surface_as_errors() {
        let store = MemoryRemoteStore::new();
        store.set_fail_pulls(true);
        store.set_fail_pushes(true);

        assert!(store.pull_full_state().await.is_err());
        assert!(
            store
                .push_full_state(&AppState::default())
                .await
                .is_err()
        );
        assert_eq!(store.push_count(), 0);
    }

    #[tokio::test]
    async fn connectivity_changes_reach_watchers() {
        let store = MemoryRemoteStore::new();
        let mut rx = store.connection_status();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);

        store.set_connected(false);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn change_events_reach_the_subscriber() {
        let store = MemoryRemoteStore::new();
        let mut events = store.subscribe();

        store.emit_change();
        store.emit_change();

        assert!(matches!(events.try_recv(), Ok(RemoteEvent::Changed)));
        assert!(matches!(events.try_recv(), Ok(RemoteEvent::Changed)));
        assert!(events.try_recv().is_err());
    }
}
