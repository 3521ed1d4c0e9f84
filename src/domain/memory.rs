use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single remembered event.
///
/// Memories are written once and never edited; the only way to remove one is
/// to clear the whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub title: String,
    /// When the remembered event happened.
    pub time: DateTime<Utc>,
    pub text: String,
    /// Topic names exactly as the caller supplied them.
    pub topics: Vec<String>,
    /// Title embedding from the title/query model. Computed once at write time.
    pub title_embedding: Vec<f32>,
    /// Wall-clock time the record was written.
    pub created_at: DateTime<Utc>,
}

/// A named group of memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// First-seen spelling, kept for display.
    pub name: String,
    /// Name embedding from the topic model.
    pub embedding: Vec<f32>,
    /// Memory ids in write order. Duplicates are kept.
    pub memories: Vec<Uuid>,
}

impl Topic {
    pub fn new(name: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            embedding,
            memories: Vec::new(),
        }
    }

    pub fn add_memory(&mut self, id: Uuid) {
        self.memories.push(id);
    }
}

/// Topic index key: "Paris" and "paris" resolve to the same topic.
pub fn topic_key(name: &str) -> String {
    name.to_lowercase()
}

/// The memory shape returned to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryView {
    pub id: Uuid,
    pub title: String,
    pub time: DateTime<Utc>,
    pub text: String,
    pub topics: Vec<String>,
}

impl From<&Memory> for MemoryView {
    fn from(memory: &Memory) -> Self {
        Self {
            id: memory.id,
            title: memory.title.clone(),
            time: memory.time,
            text: memory.text.clone(),
            topics: memory.topics.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub memory: MemoryView,
    pub score: f32,
}

/// Titles and topic names currently held, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub memories: Vec<String>,
    pub topics: Vec<String>,
}
