//! Durable snapshots of the store.
//!
//! The whole state is written as one versioned JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2026-01-01T00:00:00Z",
//!   "memories": { "<uuid>": { "id": "...", "title": "...", "title_embedding": [0.1] } },
//!   "topics": { "paris": { "name": "Paris", "embedding": [0.2], "memories": ["<uuid>"] } }
//! }
//! ```
//!
//! Writes go to a temporary sibling file that is synced and renamed over the
//! target, so a crash mid-write leaves the previous snapshot intact.

mod crystallizer;

pub use crystallizer::Crystallizer;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{Memory, Topic};
use crate::error::{PensieveError, Result};
use crate::store::StoreState;

/// On-disk format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    memories: &'a IndexMap<Uuid, Memory>,
    topics: &'a IndexMap<String, Topic>,
}

#[derive(Deserialize)]
struct SnapshotDocument {
    version: u32,
    #[serde(default)]
    memories: IndexMap<Uuid, Memory>,
    #[serde(default)]
    topics: IndexMap<String, Topic>,
}

/// The snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    // Serializes encode + write so an older payload never lands after a newer one.
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute form of the snapshot path, for messages shown to callers.
    pub fn display_path(&self) -> PathBuf {
        std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    /// Hold this while encoding and writing one snapshot.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub fn encode(state: &StoreState) -> Result<Vec<u8>> {
        let doc = SnapshotRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            memories: &state.memories,
            topics: &state.topics,
        };
        Ok(serde_json::to_vec(&doc)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<StoreState> {
        let doc: SnapshotDocument = serde_json::from_slice(bytes)?;
        if doc.version != SNAPSHOT_VERSION {
            return Err(PensieveError::SnapshotVersion {
                found: doc.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let state = StoreState {
            memories: doc.memories,
            topics: doc.topics,
        };
        state.check_consistency()?;
        Ok(state)
    }

    /// Read the snapshot. `Ok(None)` when no snapshot has been written yet.
    pub async fn load(&self) -> Result<Option<StoreState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PensieveError::io(&self.path, e)),
        };
        Self::decode(&bytes).map(Some)
    }

    /// Atomically replace the snapshot with `payload`.
    pub async fn write(&self, payload: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| PensieveError::io(&parent, e))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let tmp_path = parent.join(format!(".{file_name}.tmp.{}", Uuid::new_v4()));

        let result = Self::write_tmp(&tmp_path, payload).await;
        let result = match result {
            Ok(()) => tokio::fs::rename(&tmp_path, &self.path)
                .await
                .map_err(|e| PensieveError::io(&self.path, e)),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result
    }

    async fn write_tmp(tmp_path: &Path, payload: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)
            .await
            .map_err(|e| PensieveError::io(tmp_path, e))?;
        file.write_all(payload)
            .await
            .map_err(|e| PensieveError::io(tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| PensieveError::io(tmp_path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topic_key;

    fn sample_state() -> StoreState {
        let mut state = StoreState::default();
        let memory = Memory {
            id: Uuid::new_v4(),
            title: "Night train".to_string(),
            time: Utc::now(),
            text: "Vienna to Venice".to_string(),
            topics: vec!["Travel".to_string()],
            title_embedding: vec![0.1, -0.25, 0.333_333_34, 1e-7],
            created_at: Utc::now(),
        };
        let mut topic = Topic::new("Travel", vec![0.7, 0.1, -0.3]);
        topic.add_memory(memory.id);
        state.topics.insert(topic_key("Travel"), topic);
        state.memories.insert(memory.id, memory);
        state
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_load_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested").join("snap.json"));
        let state = sample_state();

        file.write(&SnapshotFile::encode(&state).unwrap())
            .await
            .unwrap();
        let loaded = file.load().await.unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("snap.json"));
        file.write(&SnapshotFile::encode(&sample_state()).unwrap())
            .await
            .unwrap();
        file.write(&SnapshotFile::encode(&StoreState::default()).unwrap())
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("snap.json")]);
        assert!(file.load().await.unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let bytes = br#"{"version": 99, "memories": {}, "topics": {}}"#;
        assert!(matches!(
            SnapshotFile::decode(bytes),
            Err(PensieveError::SnapshotVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SnapshotFile::decode(b"not json"),
            Err(PensieveError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_write_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let file = SnapshotFile::new(blocker.join("snap.json"));
        let err = file.write(b"{}").await.unwrap_err();
        assert!(matches!(err, PensieveError::Io { .. }));
    }
}
