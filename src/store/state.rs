use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Memory, StoreSummary, Topic, topic_key};
use crate::error::{PensieveError, Result};

/// The memory map and the topic index. Always locked, cloned and persisted
/// together so topic links never point outside the memory map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub memories: IndexMap<Uuid, Memory>,
    /// Keyed by [`topic_key`].
    pub topics: IndexMap<String, Topic>,
}

impl StoreState {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.topics.is_empty()
    }

    /// Topic names (first spelling per key) that have neither an index entry
    /// nor a precomputed embedding in `pending`.
    pub fn missing_topics<'a>(
        &self,
        names: &'a [String],
        pending: &HashMap<String, Vec<f32>>,
    ) -> Vec<&'a str> {
        let mut seen = Vec::new();
        let mut missing = Vec::new();
        for name in names {
            let key = topic_key(name);
            if self.topics.contains_key(&key) || pending.contains_key(&key) || seen.contains(&key)
            {
                continue;
            }
            seen.push(key);
            missing.push(name.as_str());
        }
        missing
    }

    /// Insert a memory and link it into every topic it names, creating topics
    /// from `pending` embeddings as needed.
    ///
    /// Nothing is mutated if a topic has neither an index entry nor a pending
    /// embedding; the memory is handed back so the caller can embed and retry.
    pub fn insert_memory(
        &mut self,
        memory: Memory,
        pending: &mut HashMap<String, Vec<f32>>,
    ) -> std::result::Result<(), Memory> {
        if !self.missing_topics(&memory.topics, pending).is_empty() {
            return Err(memory);
        }

        for name in &memory.topics {
            let key = topic_key(name);
            if !self.topics.contains_key(&key) {
                // Presence checked above.
                let Some(embedding) = pending.remove(&key) else {
                    continue;
                };
                self.topics.insert(key.clone(), Topic::new(name.clone(), embedding));
            }
            if let Some(topic) = self.topics.get_mut(&key) {
                topic.add_memory(memory.id);
            }
        }

        self.memories.insert(memory.id, memory);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.memories.clear();
        self.topics.clear();
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            memories: self.memories.values().map(|m| m.title.clone()).collect(),
            topics: self.topics.values().map(|t| t.name.clone()).collect(),
        }
    }

    /// Length of the stored title embeddings, `None` with no memories.
    pub fn title_dimension(&self) -> Option<usize> {
        self.memories.values().next().map(|m| m.title_embedding.len())
    }

    /// Length of the stored topic embeddings, `None` with no topics.
    pub fn topic_dimension(&self) -> Option<usize> {
        self.topics.values().next().map(|t| t.embedding.len())
    }

    /// Structural checks run on every loaded snapshot.
    pub fn check_consistency(&self) -> Result<()> {
        for (id, memory) in &self.memories {
            if *id != memory.id {
                return Err(PensieveError::CorruptSnapshot(format!(
                    "memory stored under {id} has id {}",
                    memory.id
                )));
            }
        }
        for (key, topic) in &self.topics {
            if *key != topic_key(&topic.name) {
                return Err(PensieveError::CorruptSnapshot(format!(
                    "topic '{}' stored under key '{key}'",
                    topic.name
                )));
            }
        }

        let title_dims = uniform_len(self.memories.values().map(|m| m.title_embedding.len()));
        if title_dims.is_none() {
            return Err(PensieveError::CorruptSnapshot(
                "title embeddings have mixed dimensions".to_string(),
            ));
        }
        let topic_dims = uniform_len(self.topics.values().map(|t| t.embedding.len()));
        if topic_dims.is_none() {
            return Err(PensieveError::CorruptSnapshot(
                "topic embeddings have mixed dimensions".to_string(),
            ));
        }
        Ok(())
    }
}

/// `Some(len)` if every length is equal (`Some(0)` for no items), `None` otherwise.
fn uniform_len(mut lens: impl Iterator<Item = usize>) -> Option<usize> {
    let Some(first) = lens.next() else {
        return Some(0);
    };
    lens.all(|len| len == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory(title: &str, topics: &[&str]) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            title: title.to_string(),
            time: Utc::now(),
            text: String::new(),
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            title_embedding: vec![1.0, 0.0],
            created_at: Utc::now(),
        }
    }

    fn pending_for(names: &[&str]) -> HashMap<String, Vec<f32>> {
        names
            .iter()
            .map(|n| (topic_key(n), vec![0.5, 0.5]))
            .collect()
    }

    #[test]
    fn test_missing_topics_dedups_by_key() {
        let state = StoreState::default();
        let names = vec!["Paris".to_string(), "paris".to_string(), "Rome".to_string()];
        assert_eq!(
            state.missing_topics(&names, &HashMap::new()),
            vec!["Paris", "Rome"]
        );
    }

    #[test]
    fn test_insert_links_every_occurrence() {
        let mut state = StoreState::default();
        let m = memory("Louvre", &["Paris", "paris"]);
        let id = m.id;

        let mut pending = pending_for(&["Paris"]);
        state.insert_memory(m, &mut pending).unwrap();

        assert_eq!(state.topics.len(), 1);
        let topic = &state.topics["paris"];
        assert_eq!(topic.name, "Paris");
        assert_eq!(topic.memories, vec![id, id]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_insert_without_embedding_hands_memory_back() {
        let mut state = StoreState::default();
        let m = memory("Colosseum", &["Rome"]);
        let id = m.id;

        let returned = state.insert_memory(m, &mut HashMap::new()).unwrap_err();
        assert_eq!(returned.id, id);
        assert!(state.is_empty());
    }

    #[test]
    fn test_existing_topic_keeps_first_spelling() {
        let mut state = StoreState::default();
        state
            .insert_memory(memory("a", &["Travel"]), &mut pending_for(&["Travel"]))
            .unwrap();
        state
            .insert_memory(memory("b", &["TRAVEL"]), &mut HashMap::new())
            .unwrap();

        assert_eq!(state.topics.len(), 1);
        assert_eq!(state.topics["travel"].name, "Travel");
        assert_eq!(state.topics["travel"].memories.len(), 2);
    }

    #[test]
    fn test_summary_in_insertion_order() {
        let mut state = StoreState::default();
        state
            .insert_memory(memory("first", &["B"]), &mut pending_for(&["B"]))
            .unwrap();
        state
            .insert_memory(memory("second", &["A"]), &mut pending_for(&["A"]))
            .unwrap();

        let summary = state.summary();
        assert_eq!(summary.memories, vec!["first", "second"]);
        assert_eq!(summary.topics, vec!["B", "A"]);
    }

    #[test]
    fn test_consistency_rejects_mixed_dimensions() {
        let mut state = StoreState::default();
        let mut short = memory("short", &[]);
        short.title_embedding = vec![1.0];
        let long = memory("long", &[]);
        state.memories.insert(short.id, short);
        state.memories.insert(long.id, long);

        assert!(matches!(
            state.check_consistency(),
            Err(PensieveError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_dimensions_follow_first_entries() {
        let mut state = StoreState::default();
        assert_eq!(state.title_dimension(), None);
        assert_eq!(state.topic_dimension(), None);

        state
            .insert_memory(memory("a", &["Travel"]), &mut pending_for(&["Travel"]))
            .unwrap();
        assert_eq!(state.title_dimension(), Some(2));
        assert_eq!(state.topic_dimension(), Some(2));
    }

    #[test]
    fn test_consistency_rejects_unnormalized_topic_key() {
        let mut state = StoreState::default();
        state
            .topics
            .insert("Paris".to_string(), Topic::new("Paris", vec![1.0]));
        assert!(state.check_consistency().is_err());
    }
}
