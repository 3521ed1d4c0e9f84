use crate::mcp::registry::NativeTool;
use crate::store::PensieveStore;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::TimeDelta;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct WriteMemoryArgs {
    title: String,
    /// Seconds before now. Fractions are kept to the millisecond.
    time_delta: f64,
    text: String,
    #[serde(default)]
    extracted_topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct TopicArgs {
    topic: String,
}

fn seconds_to_delta(seconds: f64) -> anyhow::Result<TimeDelta> {
    if !seconds.is_finite() {
        return Err(anyhow!("time_delta must be a finite number of seconds"));
    }
    TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)
        .ok_or_else(|| anyhow!("time_delta of {seconds}s is out of range"))
}

#[derive(Debug)]
pub struct WriteMemoryTool {
    store: PensieveStore,
}

impl WriteMemoryTool {
    pub fn new(store: PensieveStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NativeTool for WriteMemoryTool {
    fn name(&self) -> &str {
        "write_memory"
    }

    fn description(&self) -> &str {
        "Write a memory to the pensieve. Use whenever the user shares something worth remembering: an event, a fact about themselves, a plan."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Short title of the memory."
                },
                "time_delta": {
                    "type": "integer",
                    "description": "How many seconds ago the remembered event happened. 0 means now."
                },
                "text": {
                    "type": "string",
                    "description": "The memory itself, in a few sentences."
                },
                "extracted_topics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Topics the memory belongs to, e.g. places, people, projects."
                }
            },
            "required": ["title", "time_delta", "text", "extracted_topics"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let args: WriteMemoryArgs =
            serde_json::from_value(args).context("invalid write_memory arguments")?;
        let offset = seconds_to_delta(args.time_delta)?;

        let id = self
            .store
            .write(&args.title, offset, &args.text, &args.extracted_topics)
            .await
            .map_err(|e| anyhow!("Error writing memory: {e}"))?;

        Ok(json!(format!("Memory written successfully with {id}.")))
    }
}

#[derive(Debug)]
pub struct GetMemoriesTool {
    store: PensieveStore,
}

impl GetMemoriesTool {
    pub fn new(store: PensieveStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NativeTool for GetMemoriesTool {
    fn name(&self) -> &str {
        "get_memories"
    }

    fn description(&self) -> &str {
        "Retrieve the memories whose titles best match a question or phrase."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for, e.g. 'when did I visit the Louvre'."
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let args: QueryArgs =
            serde_json::from_value(args).context("invalid get_memories arguments")?;
        let memories = self
            .store
            .query_memories(&args.query)
            .await
            .map_err(|e| anyhow!("Error retrieving memories: {e}"))?;
        Ok(serde_json::to_value(memories)?)
    }
}

#[derive(Debug)]
pub struct GetTopicTimelineTool {
    store: PensieveStore,
}

impl GetTopicTimelineTool {
    pub fn new(store: PensieveStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NativeTool for GetTopicTimelineTool {
    fn name(&self) -> &str {
        "get_topic_timeline"
    }

    fn description(&self) -> &str {
        "List the memories filed under the topics most similar to the given one, oldest first."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Topic to build the timeline for."
                }
            },
            "required": ["topic"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let args: TopicArgs =
            serde_json::from_value(args).context("invalid get_topic_timeline arguments")?;
        let memories = self
            .store
            .topic_timeline(&args.topic)
            .await
            .map_err(|e| anyhow!("Error building topic timeline: {e}"))?;
        Ok(serde_json::to_value(memories)?)
    }
}

#[derive(Debug)]
pub struct CrystalizeMemoriesTool {
    store: PensieveStore,
}

impl CrystalizeMemoriesTool {
    pub fn new(store: PensieveStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NativeTool for CrystalizeMemoriesTool {
    fn name(&self) -> &str {
        "crystalize_memories"
    }

    fn description(&self) -> &str {
        "Save all memories to disk now instead of waiting for the next periodic save."
    }

    fn schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let path = self
            .store
            .crystallize()
            .await
            .map_err(|e| anyhow!("Error crystalizing memories: {e}"))?;
        Ok(json!(format!(
            "Memories crystalized successfully to {}",
            path.display()
        )))
    }
}

#[derive(Debug)]
pub struct ClearMemoriesTool {
    store: PensieveStore,
}

impl ClearMemoriesTool {
    pub fn new(store: PensieveStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NativeTool for ClearMemoriesTool {
    fn name(&self) -> &str {
        "clear_memories"
    }

    fn description(&self) -> &str {
        "Forget everything. Deletes every memory and topic. Only use when the user explicitly asks."
    }

    fn schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        // The maps are already empty if only the snapshot failed; the next save persists that.
        if let Err(error) = self.store.clear().await {
            tracing::warn!(%error, "snapshot after clear failed");
        }
        Ok(json!("All memories cleared successfully."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_delta_keeps_sign_and_fraction() {
        assert_eq!(seconds_to_delta(1.5).unwrap(), TimeDelta::milliseconds(1500));
        assert_eq!(seconds_to_delta(-10.0).unwrap(), TimeDelta::seconds(-10));
    }

    #[test]
    fn test_seconds_to_delta_rejects_non_finite() {
        assert!(seconds_to_delta(f64::NAN).is_err());
        assert!(seconds_to_delta(f64::INFINITY).is_err());
    }
}
