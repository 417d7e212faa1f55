//! The [`SnapshotStore`] trait: the extension point for persistence backends.
//!
//! Grounded in the teacher's `CheckpointSaver` trait shape, but collapsed
//! to the single-file model spec §4.7 and §9(c) call for: one snapshot
//! per want id, no per-thread history, no time travel. Implement this
//! trait to back MyWant with something other than a local JSON file (a
//! database, object storage, ...).

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Snapshot, SnapshotRecord};

/// A backend capable of persisting and restoring want state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist (or overwrite) a single want's record.
    async fn put(&self, want_id: &str, record: SnapshotRecord) -> Result<()>;

    /// Remove a want's record, if present.
    async fn remove(&self, want_id: &str) -> Result<()>;

    /// Fetch a single want's record.
    async fn get(&self, want_id: &str) -> Result<Option<SnapshotRecord>>;

    /// Load every persisted record at once, e.g. on orchestrator startup.
    async fn load_all(&self) -> Result<Snapshot>;

    /// Atomically replace the entire snapshot with `snapshot`.
    ///
    /// Used by [`crate::writer::SnapshotWriter`] so that a periodic flush
    /// is a single write rather than N individual `put` calls.
    async fn replace_all(&self, snapshot: Snapshot) -> Result<()>;
}
