//! In-memory snapshot store, for tests and for disabling persistence.
//!
//! Grounded in the teacher's `InMemoryCheckpointSaver`: a thread-safe map
//! behind a single lock, with no durability across process restarts.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{Snapshot, SnapshotRecord};
use crate::store::SnapshotStore;

/// A [`SnapshotStore`] that keeps everything in an `Arc<RwLock<Snapshot>>`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    inner: Arc<RwLock<Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn put(&self, want_id: &str, record: SnapshotRecord) -> Result<()> {
        self.inner.write().await.insert(want_id.to_string(), record);
        Ok(())
    }

    async fn remove(&self, want_id: &str) -> Result<()> {
        self.inner.write().await.remove(want_id);
        Ok(())
    }

    async fn get(&self, want_id: &str) -> Result<Option<SnapshotRecord>> {
        Ok(self.inner.read().await.get(want_id).cloned())
    }

    async fn load_all(&self) -> Result<Snapshot> {
        Ok(self.inner.read().await.clone())
    }

    async fn replace_all(&self, snapshot: Snapshot) -> Result<()> {
        *self.inner.write().await = snapshot;
        Ok(())
    }
}
