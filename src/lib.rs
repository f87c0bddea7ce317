//! Weekquest: state synchronization and migration engine for a weekly
//! task tracker.
//!
//! The engine owns the canonical household state and keeps two replicas
//! converged — a durable local store and a shared remote store — while
//! tolerating intermittent connectivity, concurrent edits from other
//! devices, and persisted blobs written by earlier schema generations.
//!
//! # Architecture
//!
//! Leaves first:
//! - **`calendar`**: pure Monday-first week math
//! - **`migrate`**: structural schema migration of persisted blobs
//! - **`store`**: the local and remote store trait boundaries
//! - **`archive`**: week rollover into immutable history
//! - **`ops`**: the pure mutation/read API over [`AppState`]
//! - **`engine`**: the [`SyncEngine`] tying it together — debounced pushes,
//!   echo-suppressed pulls, connectivity handling, sync status

pub mod archive;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod ops;
pub mod state;
pub mod store;

pub use config::EngineConfig;
pub use engine::{SyncEngine, SyncStatus};
pub use error::{EngineError, Result};
pub use ops::TaskUpdate;
pub use state::{
    AppState, DayProgress, Task, TaskId, TemplateEntry, WeekData, WeekHistory, Weekday,
    WeeklySchedule, WeeklyTemplate,
};
pub use store::{
    ConnectionStatus, HttpRemoteStore, JsonFileStore, LocalStore, MemoryLocalStore,
    MemoryRemoteStore, RemoteEvent, RemoteStore,
};
