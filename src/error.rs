//! Error types for the sync engine.

/// Top-level error type for the weekly-task sync engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Local store read/write error.
    #[error("local store error: {0}")]
    Local(String),

    /// Remote store request error (network failure, backend rejection).
    #[error("remote store error: {0}")]
    Remote(String),

    /// State serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
