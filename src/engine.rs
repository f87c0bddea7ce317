//! The sync engine: single owner of the canonical [`AppState`].
//!
//! Every mutation funnels through [`SyncEngine::apply`]: it is applied
//! against the latest committed state under one async mutex (no lost
//! updates, no stale snapshots), persisted to the local store before the
//! call returns, and scheduled for a debounced whole-state push to the
//! remote store. Pulls triggered by remote-change notifications replace the
//! canonical state wholesale — last-writer-wins at full-state granularity,
//! a deliberate simplification for a single-household, low-concurrency
//! setting. Two devices editing offline-simultaneously will have one
//! overwrite the other; per-field merging is out of scope.
//!
//! Echo suppression: the engine timestamps every successful push and
//! ignores change notifications arriving within a short window afterwards,
//! so its own writes never ping-pong back as pulls that could undo a fresh
//! mutation.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::archive;
use crate::calendar;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::migrate;
use crate::ops::{self, TaskUpdate};
use crate::state::{AppState, DayProgress, Task, TaskId, Weekday};
use crate::store::{ConnectionStatus, LocalStore, RemoteStore};

/// Application-level sync status, distinct from transport connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Syncing,
    Offline,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Offline => "offline",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the canonical state and mediates between the local and remote
/// stores. Injectable: tests and multiple households run independent
/// instances.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    state: Mutex<AppState>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    status_tx: watch::Sender<SyncStatus>,
    dirty_tx: mpsc::UnboundedSender<()>,
    /// Timestamp of the last successful push, for echo suppression.
    last_push: std::sync::Mutex<Option<Instant>>,
}

impl SyncEngine {
    /// Start the engine: load and migrate the local blob, reconcile the
    /// week, run the startup sync (adopt remote state or seed the remote
    /// from local), then spawn the background push/pull/connectivity loops.
    pub async fn start(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let (status_tx, _) = watch::channel(SyncStatus::Syncing);
        let (dirty_tx, dirty_rx) = mpsc::unbounded_channel();

        // Local state first: migrated and week-reconciled, written back so
        // the blob on disk is always current-generation.
        let raw = local.load_raw()?;
        let mut state = migrate::migrate(raw.unwrap_or(serde_json::Value::Null));
        archive::reconcile_week(&mut state, calendar::today());
        local.save(&state)?;

        let inner = Arc::new(EngineInner {
            config,
            state: Mutex::new(state),
            local,
            remote,
            status_tx,
            dirty_tx,
            last_push: std::sync::Mutex::new(None),
        });

        inner.startup_sync().await;

        spawn_push_loop(Arc::clone(&inner), dirty_rx);
        spawn_remote_change_loop(Arc::clone(&inner));
        spawn_connectivity_loop(Arc::clone(&inner));
        spawn_local_change_loop(Arc::clone(&inner));

        Ok(Self { inner })
    }

    /// Watchable sync status. Initial value is `Syncing`; a load is always
    /// pending at startup.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Read snapshot of the canonical state.
    pub async fn snapshot(&self) -> AppState {
        self.inner.state.lock().await.clone()
    }

    /// Run the week-rollover check (e.g., on app foreground). Redundant
    /// invocations in the same calendar week neither persist nor schedule
    /// a push; only an actual state rewrite commits.
    pub async fn reconcile(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if !archive::reconcile_week(&mut state, calendar::today()) {
            return Ok(());
        }
        self.inner.local.save(&state)?;
        drop(state);
        let _ = self.inner.dirty_tx.send(());
        info!("week reconciled");
        Ok(())
    }

    /// Apply one mutation against the latest committed state.
    ///
    /// The transform runs under the state lock, the result is persisted to
    /// the local store before this returns, and a debounced remote push is
    /// scheduled. Mutations commit in call order.
    async fn apply<T>(&self, op: impl FnOnce(&mut AppState) -> T) -> Result<T> {
        let mut state = self.inner.state.lock().await;
        let out = op(&mut *state);
        self.inner.local.save(&state)?;
        drop(state);
        // Receiver only closes on shutdown; a lost signal is harmless then.
        let _ = self.inner.dirty_tx.send(());
        Ok(out)
    }

    // ── Mutation API ───────────────────────────────────────────────────

    /// Flip today's completion for a task. Bonus tasks earn a permanent
    /// star on each false→true transition.
    pub async fn toggle_completion(&self, id: &TaskId) -> Result<()> {
        let today = calendar::today();
        self.apply(|state| ops::toggle_completion(state, id, today))
            .await
    }

    /// Flip the skipped flag for a task on a date of the current week.
    pub async fn toggle_skip(&self, id: &TaskId, date: NaiveDate) -> Result<()> {
        self.apply(|state| ops::toggle_skip(state, id, date)).await
    }

    pub async fn add_task(
        &self,
        title: impl Into<String>,
        emoji: impl Into<String>,
        is_bonus: bool,
    ) -> Result<TaskId> {
        let (title, emoji) = (title.into(), emoji.into());
        self.apply(|state| ops::add_task(state, title, emoji, is_bonus))
            .await
    }

    pub async fn edit_task(&self, id: &TaskId, update: TaskUpdate) -> Result<()> {
        self.apply(|state| ops::edit_task(state, id, update)).await
    }

    pub async fn remove_task(&self, id: &TaskId) -> Result<()> {
        self.apply(|state| ops::remove_task(state, id)).await
    }

    pub async fn schedule_task(&self, id: &TaskId, day: Weekday) -> Result<()> {
        self.apply(|state| ops::schedule_task(state, id, day)).await
    }

    pub async fn unschedule_task(&self, id: &TaskId, day: Weekday) -> Result<()> {
        self.apply(|state| ops::unschedule_task(state, id, day))
            .await
    }

    /// Create a new non-bonus task and schedule it on `day` in one commit.
    pub async fn add_task_to_day(
        &self,
        title: impl Into<String>,
        emoji: impl Into<String>,
        day: Weekday,
    ) -> Result<TaskId> {
        let (title, emoji) = (title.into(), emoji.into());
        self.apply(|state| ops::add_task_to_day(state, title, emoji, day))
            .await
    }

    pub async fn copy_day(&self, source: Weekday, targets: &[Weekday]) -> Result<()> {
        self.apply(|state| ops::copy_day(state, source, targets))
            .await
    }

    pub async fn save_template(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.apply(|state| ops::save_template(state, name)).await
    }

    /// Load a saved template. Returns `false` when no template has that
    /// name.
    pub async fn load_template(&self, name: &str) -> Result<bool> {
        self.apply(|state| ops::load_template(state, name)).await
    }

    pub async fn delete_template(&self, name: &str) -> Result<()> {
        self.apply(|state| ops::delete_template(state, name)).await
    }

    pub async fn reset_week(&self) -> Result<()> {
        self.apply(ops::reset_week).await
    }

    pub async fn set_parent_pin(&self, pin: impl Into<String>) -> Result<()> {
        let pin = pin.into();
        self.apply(|state| ops::set_parent_pin(state, pin)).await
    }

    // ── Read API ───────────────────────────────────────────────────────

    /// Progress entry for a date. Empty when the date falls outside the
    /// current week.
    pub async fn day_progress(&self, date: NaiveDate) -> DayProgress {
        self.inner
            .state
            .lock()
            .await
            .current_week
            .day(date)
            .cloned()
            .unwrap_or_else(|| DayProgress::empty(date))
    }

    /// Today's progress entry.
    pub async fn today_progress(&self) -> DayProgress {
        self.day_progress(calendar::today()).await
    }

    pub async fn tasks_for_day(&self, day: Weekday) -> Vec<Task> {
        ops::tasks_for_day(&*self.inner.state.lock().await, day)
    }

    pub async fn unscheduled_tasks_for_day(&self, day: Weekday) -> Vec<Task> {
        ops::unscheduled_tasks_for_day(&*self.inner.state.lock().await, day)
    }

    pub async fn bonus_tasks(&self) -> Vec<Task> {
        ops::bonus_tasks(&*self.inner.state.lock().await)
    }

    /// Consecutive most-recent archived weeks at or above the streak
    /// threshold.
    pub async fn current_streak(&self) -> u32 {
        archive::current_streak(&self.inner.state.lock().await.week_history)
    }
}

impl EngineInner {
    fn set_status(&self, status: SyncStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            debug!("sync status {previous} -> {status}");
        }
    }

    /// Status for a failed remote operation: `Offline` when the transport
    /// is down, `Error` otherwise.
    fn failure_status(&self) -> SyncStatus {
        match *self.remote.connection_status().borrow() {
            ConnectionStatus::Disconnected => SyncStatus::Offline,
            ConnectionStatus::Connected => SyncStatus::Error,
        }
    }

    /// Startup sync: exactly one of two paths runs per session. A
    /// successful pull with a non-empty task roster is adopted wholesale;
    /// otherwise the local (migrated, reconciled) state is canonical and is
    /// pushed to seed the remote.
    async fn startup_sync(self: &Arc<Self>) {
        match self.remote.pull_full_state().await {
            Ok(Some(remote_state)) if !remote_state.tasks.is_empty() => {
                let mut adopted = remote_state;
                archive::reconcile_week(&mut adopted, calendar::today());
                let mut state = self.state.lock().await;
                *state = adopted;
                if let Err(e) = self.local.save(&state) {
                    warn!("cannot persist adopted remote state: {e}");
                }
                drop(state);
                info!("adopted remote state on load");
                self.set_status(SyncStatus::Synced);
            }
            Ok(_) => {
                info!("remote store is empty, seeding it from local state");
                self.push_now().await;
            }
            Err(e) => {
                warn!("initial pull failed ({e}), local state stays authoritative");
                self.push_now().await;
            }
        }
    }

    /// Push the whole current state to the remote store.
    async fn push_now(self: &Arc<Self>) {
        self.set_status(SyncStatus::Syncing);
        let snapshot = self.state.lock().await.clone();

        match self.remote.push_full_state(&snapshot).await {
            Ok(()) => {
                if let Ok(mut last) = self.last_push.lock() {
                    *last = Some(Instant::now());
                }
                debug!("pushed full state to remote");
                self.set_status(SyncStatus::Synced);
            }
            Err(e) => {
                // Local copy remains authoritative; retried on the next
                // mutation or reconnect.
                warn!("push failed: {e}");
                self.set_status(self.failure_status());
            }
        }
    }

    /// Pull the full remote state and adopt it wholesale.
    async fn pull_now(self: &Arc<Self>) {
        self.set_status(SyncStatus::Syncing);

        match self.remote.pull_full_state().await {
            Ok(Some(mut remote_state)) => {
                archive::reconcile_week(&mut remote_state, calendar::today());
                let mut state = self.state.lock().await;
                *state = remote_state;
                if let Err(e) = self.local.save(&state) {
                    warn!("cannot persist pulled state: {e}");
                }
                drop(state);
                debug!("adopted remote state after change notification");
                self.set_status(SyncStatus::Synced);
            }
            Ok(None) => {
                debug!("remote returned no state on pull");
                self.set_status(SyncStatus::Synced);
            }
            Err(e) => {
                warn!("pull failed: {e}");
                self.set_status(self.failure_status());
            }
        }
    }

    /// Whether a remote-change notification arriving now would be an echo
    /// of our own recent push.
    fn within_echo_window(&self) -> bool {
        let Some(pushed_at) = self.last_push.lock().ok().and_then(|guard| *guard) else {
            return false;
        };
        pushed_at.elapsed() < self.config.echo_window()
    }
}

/// Debounced pusher: a push fires only after the quiet interval elapses
/// with no newer mutation; the newest mutation always wins the timer.
fn spawn_push_loop(inner: Arc<EngineInner>, mut dirty_rx: mpsc::UnboundedReceiver<()>) {
    tokio::spawn(async move {
        while dirty_rx.recv().await.is_some() {
            loop {
                tokio::select! {
                    _ = sleep(inner.config.push_debounce()) => break,
                    more = dirty_rx.recv() => {
                        if more.is_none() {
                            return;
                        }
                        // Newer mutation: restart the quiet interval.
                    }
                }
            }
            inner.push_now().await;
        }
        debug!("push loop stopped");
    });
}

/// Remote-change listener: drops echoes of our own pushes, coalesces
/// genuine bursts, then pulls.
fn spawn_remote_change_loop(inner: Arc<EngineInner>) {
    let mut events = inner.remote.subscribe();
    tokio::spawn(async move {
        while events.recv().await.is_some() {
            if inner.within_echo_window() {
                debug!("ignoring echo of our own push");
                continue;
            }
            loop {
                tokio::select! {
                    _ = sleep(inner.config.pull_coalesce()) => break,
                    more = events.recv() => {
                        if more.is_none() {
                            break;
                        }
                    }
                }
            }
            inner.pull_now().await;
        }
        debug!("remote change loop stopped");
    });
}

/// Connectivity watcher: loss flips status to `Offline`; regain re-asserts
/// the local replica with an immediate push (not a pull).
fn spawn_connectivity_loop(inner: Arc<EngineInner>) {
    let mut conn_rx = inner.remote.connection_status();
    tokio::spawn(async move {
        while conn_rx.changed().await.is_ok() {
            let status = *conn_rx.borrow_and_update();
            match status {
                ConnectionStatus::Disconnected => {
                    info!("connectivity lost");
                    inner.set_status(SyncStatus::Offline);
                }
                ConnectionStatus::Connected => {
                    info!("connectivity regained, re-asserting local state");
                    inner.push_now().await;
                }
            }
        }
        debug!("connectivity loop stopped");
    });
}

/// Cross-process local-store watcher: an external write to the same blob
/// (another window of the app) becomes the new canonical state.
fn spawn_local_change_loop(inner: Arc<EngineInner>) {
    let Some(mut changes) = inner.local.changes() else {
        return;
    };
    tokio::spawn(async move {
        while changes.recv().await.is_some() {
            inner.reload_local().await;
        }
        debug!("local change loop stopped");
    });
}

impl EngineInner {
    async fn reload_local(&self) {
        let raw = match self.local.load_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cannot reload local state: {e}");
                return;
            }
        };

        let mut reloaded = migrate::migrate(raw.unwrap_or(serde_json::Value::Null));
        archive::reconcile_week(&mut reloaded, calendar::today());

        let mut state = self.state.lock().await;
        if *state == reloaded {
            return;
        }
        *state = reloaded;
        drop(state);
        debug!("adopted externally written local state");
        let _ = self.dirty_tx.send(());
    }
}
