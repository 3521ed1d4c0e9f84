//! The memory store: memory records, the topic index, and their snapshot.
//!
//! # Locking
//!
//! Both maps live behind one `RwLock`. Embeddings are computed before the
//! lock is taken; a memory and all of its topic links are applied inside a
//! single write-lock section, so readers and snapshots never observe one
//! without the other.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::TimeDelta;
//! use pensieve::embedding::HashingProvider;
//! use pensieve::store::{PensieveStore, StoreOptions};
//!
//! # async fn demo() -> pensieve::error::Result<()> {
//! let store = PensieveStore::open(
//!     StoreOptions::default(),
//!     Arc::new(HashingProvider::new("title", 256)),
//!     Arc::new(HashingProvider::new("topic", 256)),
//! )
//! .await?;
//!
//! let topics = vec!["Paris".to_string()];
//! store.write("Louvre", TimeDelta::hours(2), "Saw the Mona Lisa", &topics).await?;
//! let timeline = store.topic_timeline("paris").await?;
//! assert_eq!(timeline.len(), 1);
//! # Ok(())
//! # }
//! ```

mod retrieval;
mod state;

pub use state::StoreState;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::{Memory, StoreSummary, topic_key};
use crate::embedding::EmbeddingProvider;
use crate::error::{PensieveError, Result};
use crate::persistence::SnapshotFile;

/// Limits and paths the store runs with.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub snapshot_path: PathBuf,
    /// Upper bound on `query_memories` results.
    pub max_memories: usize,
    /// Number of similar topics a timeline query expands to.
    pub max_topics: usize,
    /// Writes since the last snapshot that trigger an immediate snapshot.
    pub max_unsaved_memories: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            snapshot_path: config.snapshot_path.clone(),
            max_memories: config.max_memories,
            max_topics: config.max_topics,
            max_unsaved_memories: config.max_unsaved_memories,
        }
    }
}

/// Shared handle to the store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PensieveStore {
    state: Arc<RwLock<StoreState>>,
    title_embedder: Arc<dyn EmbeddingProvider>,
    topic_embedder: Arc<dyn EmbeddingProvider>,
    snapshots: SnapshotFile,
    options: StoreOptions,
    unsaved: Arc<AtomicUsize>,
}

impl PensieveStore {
    /// Load the snapshot if one exists, otherwise start empty.
    pub async fn open(
        options: StoreOptions,
        title_embedder: Arc<dyn EmbeddingProvider>,
        topic_embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let snapshots = SnapshotFile::new(options.snapshot_path.clone());
        let state = match snapshots.load().await? {
            Some(state) => {
                info!(
                    name: "store.snapshot.loaded",
                    path = %snapshots.path().display(),
                    memories = state.memories.len(),
                    topics = state.topics.len(),
                    "Loaded memories from snapshot"
                );
                state
            }
            None => {
                info!(
                    name: "store.snapshot.absent",
                    path = %snapshots.path().display(),
                    "No snapshot found, starting empty"
                );
                StoreState::default()
            }
        };

        check_dimension(
            "title",
            "embedding.title_model",
            state.title_dimension(),
            title_embedder.as_ref(),
            &snapshots,
        )
        .await?;
        check_dimension(
            "topic",
            "embedding.topic_model",
            state.topic_dimension(),
            topic_embedder.as_ref(),
            &snapshots,
        )
        .await?;

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            title_embedder,
            topic_embedder,
            snapshots,
            options,
            unsaved: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn snapshot_file(&self) -> &SnapshotFile {
        &self.snapshots
    }

    /// Record a memory that happened `time_offset` before now.
    ///
    /// Each topic is matched case-insensitively against the index and created
    /// on first sight. The id is appended once per occurrence, so
    /// `["Paris", "paris"]` links it twice into the single `"paris"` topic.
    /// On an embedding failure nothing is written.
    pub async fn write(
        &self,
        title: &str,
        time_offset: TimeDelta,
        text: &str,
        topics: &[String],
    ) -> Result<Uuid> {
        let now = Utc::now();
        let time = now.checked_sub_signed(time_offset).ok_or_else(|| {
            PensieveError::InvalidArgument(format!(
                "time offset of {}s is out of range",
                time_offset.num_seconds()
            ))
        })?;

        let title_embedding = self.title_embedder.encode(title).await?;
        let mut memory = Memory {
            id: Uuid::new_v4(),
            title: title.to_string(),
            time,
            text: text.to_string(),
            topics: topics.to_vec(),
            title_embedding,
            created_at: now,
        };
        let id = memory.id;

        let mut pending: HashMap<String, Vec<f32>> = HashMap::new();
        loop {
            let missing: Vec<String> = {
                let state = self.state.read().await;
                state
                    .missing_topics(topics, &pending)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            };
            if !missing.is_empty() {
                let embeddings = self.topic_embedder.encode_batch(missing.clone()).await?;
                if embeddings.len() != missing.len() {
                    return Err(PensieveError::Embedding {
                        model: self.topic_embedder.model_name().to_string(),
                        message: format!(
                            "expected {} embeddings, got {}",
                            missing.len(),
                            embeddings.len()
                        ),
                    });
                }
                pending.extend(missing.iter().map(|name| topic_key(name)).zip(embeddings));
            }

            // A concurrent clear can remove a topic we skipped embedding; retry then.
            let mut state = self.state.write().await;
            match state.insert_memory(memory, &mut pending) {
                Ok(()) => break,
                Err(returned) => memory = returned,
            }
        }

        info!(
            name: "store.memory.written",
            memory_id = %id,
            title = %title,
            topics = topics.len(),
            "Memory written"
        );

        let unsaved = self.unsaved.fetch_add(1, Ordering::SeqCst) + 1;
        if unsaved >= self.options.max_unsaved_memories {
            if let Err(error) = self.crystallize().await {
                warn!(%error, unsaved, "snapshot after unsaved writes failed");
            }
        }

        Ok(id)
    }

    /// Empty both maps, then snapshot so the empty state survives a restart.
    pub async fn clear(&self) -> Result<PathBuf> {
        {
            let mut state = self.state.write().await;
            state.clear();
        }
        info!(name: "store.cleared", "All memories cleared");
        self.crystallize().await
    }

    /// Write the current state to the snapshot file.
    pub async fn crystallize(&self) -> Result<PathBuf> {
        let _write_guard = self.snapshots.lock().await;
        let (payload, covered) = {
            let state = self.state.read().await;
            (
                SnapshotFile::encode(&state)?,
                self.unsaved.load(Ordering::SeqCst),
            )
        };
        self.snapshots.write(&payload).await?;
        // Writes that landed while the file was being written stay counted.
        let _ = self
            .unsaved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(covered))
            });

        let path = self.snapshots.display_path();
        info!(
            name: "store.crystallized",
            path = %path.display(),
            bytes = payload.len(),
            "Memories crystallized"
        );
        Ok(path)
    }

    pub async fn summary(&self) -> StoreSummary {
        self.state.read().await.summary()
    }

    pub async fn memory_count(&self) -> usize {
        self.state.read().await.memories.len()
    }

    pub async fn topic_count(&self) -> usize {
        self.state.read().await.topics.len()
    }

    /// Copy of the full state, embeddings included.
    pub async fn export_state(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Writes not yet covered by a snapshot.
    pub fn unsaved_writes(&self) -> usize {
        self.unsaved.load(Ordering::SeqCst)
    }
}

/// Loaded vectors must match what the provider produces now, otherwise new
/// writes would mix dimensions into the snapshot.
async fn check_dimension(
    kind: &str,
    setting: &str,
    stored: Option<usize>,
    provider: &dyn EmbeddingProvider,
    snapshots: &SnapshotFile,
) -> Result<()> {
    let Some(stored) = stored else {
        return Ok(());
    };
    let current = provider.dimension().await?;
    if stored == current {
        return Ok(());
    }
    Err(PensieveError::Config(format!(
        "snapshot {} holds {stored}-dimensional {kind} embeddings but model '{}' produces {current}; \
         restore the {setting} / embedding.provider / embedding.hashing_dimension it was written with, \
         or move the snapshot aside to start empty",
        snapshots.path().display(),
        provider.model_name(),
    )))
}
