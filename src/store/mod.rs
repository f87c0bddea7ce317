//! Storage collaborators: the durable local store and the shared remote
//! store, both specified as trait boundaries so the engine can be driven
//! against in-process fakes in tests.

mod http;
mod local;
mod remote;

pub use http::HttpRemoteStore;
pub use local::{JsonFileStore, LocalStore, MemoryLocalStore};
pub use remote::{ConnectionStatus, MemoryRemoteStore, RemoteEvent, RemoteStore};
