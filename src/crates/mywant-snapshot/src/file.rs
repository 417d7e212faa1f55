//! A [`SnapshotStore`] backed by a single JSON file on disk.
//!
//! Grounded in the teacher's checkpoint file writer: the whole [`Snapshot`]
//! is serialized and written to a temp file in the same directory as the
//! target, then renamed into place, so a crash mid-write never leaves a
//! truncated or partially-written snapshot on disk. All mutation goes
//! through an in-process lock — concurrent writers still serialize, but
//! the rename itself is what gives readers an atomic view.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SnapshotError};
use crate::model::{Snapshot, SnapshotRecord};
use crate::store::SnapshotStore;

/// Persists a [`Snapshot`] to a single JSON file, atomically.
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    // Guards read-modify-write sequences (put/remove) against each other;
    // the write itself is additionally made atomic via temp-file + rename.
    lock: Mutex<()>,
}

impl FileSnapshotStore {
    /// Point a new store at `path`. The file is not created until the
    /// first write; [`Self::load_all`] on a missing file returns an empty
    /// snapshot rather than an error.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_snapshot(&self) -> Result<Snapshot> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::new()),
            Err(err) => Err(SnapshotError::Io(err)),
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, &bytes).await?;
        fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), wants = snapshot.len(), "wrote snapshot");
        Ok(())
    }

    /// The file this store reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn put(&self, want_id: &str, record: SnapshotRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;
        snapshot.insert(want_id.to_string(), record);
        self.write_snapshot(&snapshot).await
    }

    async fn remove(&self, want_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;
        if snapshot.remove(want_id).is_none() {
            warn!(want_id, "remove called for want with no snapshot record");
        }
        self.write_snapshot(&snapshot).await
    }

    async fn get(&self, want_id: &str) -> Result<Option<SnapshotRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_snapshot().await?.remove(want_id))
    }

    async fn load_all(&self) -> Result<Snapshot> {
        let _guard = self.lock.lock().await;
        self.read_snapshot().await
    }

    async fn replace_all(&self, snapshot: Snapshot) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_snapshot(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> SnapshotRecord {
        SnapshotRecord {
            metadata: json!({"name": "n"}),
            spec: json!({}),
            status: "idle".into(),
            state: json!({}),
            history: json!([]),
        }
    }

    #[tokio::test]
    async fn load_all_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_persists_across_fresh_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        store.put("w1", record()).await.unwrap();

        let reopened = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        let all = reopened.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["w1"].status, "idle");
    }

    #[tokio::test]
    async fn remove_drops_the_record_but_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        store.put("w1", record()).await.unwrap();
        store.put("w2", record()).await.unwrap();
        store.remove("w1").await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("w2"));
    }

    #[tokio::test]
    async fn replace_all_overwrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        store.put("w1", record()).await.unwrap();

        let mut fresh = Snapshot::new();
        fresh.insert("w2".to_string(), record());
        store.replace_all(fresh).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("w2"));
    }

    #[tokio::test]
    async fn no_temp_file_survives_a_successful_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = FileSnapshotStore::new(&path);
        store.put("w1", record()).await.unwrap();
        assert!(!store.temp_path().exists());
    }
}
