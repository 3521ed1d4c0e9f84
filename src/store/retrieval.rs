//! Similarity ranking over the in-memory maps. Plain linear scans.

use tracing::debug;

use super::{PensieveStore, StoreState};
use crate::domain::{MemoryMatch, MemoryView, topic_key};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// Sort by score, highest first. Stable, so equal scores keep input order.
fn rank_descending<T>(mut scored: Vec<(f32, T)>) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
}

/// Keys of the `limit` topics closest to `query`, ties in index order.
fn closest_topic_keys<'a>(
    state: &'a StoreState,
    embedder: &dyn EmbeddingProvider,
    query: &[f32],
    limit: usize,
) -> Vec<(&'a str, &'a str)> {
    let candidates: Vec<&[f32]> = state
        .topics
        .values()
        .map(|t| t.embedding.as_slice())
        .collect();
    let scores = embedder.similarities(query, &candidates);

    let scored = scores
        .into_iter()
        .zip(state.topics.iter())
        .map(|(score, (key, topic))| (score, (key.as_str(), topic.name.as_str())))
        .collect();

    rank_descending(scored)
        .into_iter()
        .take(limit)
        .map(|(_, pair)| pair)
        .collect()
}

impl PensieveStore {
    /// Memories ranked by title similarity to `query`, with their scores.
    pub async fn search_memories(&self, query: &str, limit: usize) -> Result<Vec<MemoryMatch>> {
        if self.state.read().await.memories.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.title_embedder.encode(query).await?;

        let state = self.state.read().await;
        let candidates: Vec<&[f32]> = state
            .memories
            .values()
            .map(|m| m.title_embedding.as_slice())
            .collect();
        let scores = self
            .title_embedder
            .similarities(&query_embedding, &candidates);

        let scored = scores.into_iter().zip(state.memories.values()).collect();
        let matches: Vec<MemoryMatch> = rank_descending(scored)
            .into_iter()
            .take(limit)
            .map(|(score, memory)| MemoryMatch {
                memory: MemoryView::from(memory),
                score,
            })
            .collect();

        debug!(query = %query, results = matches.len(), "memory search");
        Ok(matches)
    }

    /// The `max_memories` memories whose titles best match `query`.
    pub async fn query_memories(&self, query: &str) -> Result<Vec<MemoryView>> {
        Ok(self
            .search_memories(query, self.options.max_memories)
            .await?
            .into_iter()
            .map(|m| m.memory)
            .collect())
    }

    /// Display names of the `max_topics` topics closest to `name`.
    pub async fn resolve_similar_topics(&self, name: &str) -> Result<Vec<String>> {
        if self.state.read().await.topics.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.topic_embedder.encode(name).await?;
        let state = self.state.read().await;
        Ok(closest_topic_keys(
            &state,
            self.topic_embedder.as_ref(),
            &query_embedding,
            self.options.max_topics,
        )
        .into_iter()
        .map(|(_, display)| display.to_string())
        .collect())
    }

    /// Memories from the topics closest to `topic`, oldest first.
    ///
    /// A memory tagged with two of the matched topics appears twice.
    pub async fn topic_timeline(&self, topic: &str) -> Result<Vec<MemoryView>> {
        if self.state.read().await.topics.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.topic_embedder.encode(&topic_key(topic)).await?;

        // Ranking and collection under one guard so a concurrent clear can't split them.
        let state = self.state.read().await;
        let keys = closest_topic_keys(
            &state,
            self.topic_embedder.as_ref(),
            &query_embedding,
            self.options.max_topics,
        );

        let mut timeline: Vec<MemoryView> = keys
            .iter()
            .filter_map(|(key, _)| state.topics.get(*key))
            .flat_map(|t| t.memories.iter())
            .filter_map(|id| state.memories.get(id))
            .map(MemoryView::from)
            .collect();
        timeline.sort_by_key(|m| m.time);

        debug!(
            topic = %topic,
            matched = ?keys.iter().map(|(_, name)| *name).collect::<Vec<_>>(),
            results = timeline.len(),
            "topic timeline"
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_descending_is_stable() {
        let ranked = rank_descending(vec![(0.5, "a"), (0.9, "b"), (0.5, "c"), (0.1, "d")]);
        let order: Vec<&str> = ranked.into_iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
    }
}
