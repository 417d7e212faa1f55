//! Error types for snapshot persistence.

use thiserror::Error;

/// Convenience result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors that can occur while persisting or loading a [`crate::Snapshot`].
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot could not be (de)serialized.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A requested node id has no snapshot record.
    #[error("no snapshot for want '{0}'")]
    NotFound(String),

    /// The snapshot store is closed and no longer accepts writes.
    #[error("snapshot store is closed")]
    Closed,
}
