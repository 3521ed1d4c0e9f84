//! The tools the store exposes to a model.
//!
//! | Tool | Arguments | Result |
//! |---|---|---|
//! | `write_memory` | `title`, `time_delta`, `text`, `extracted_topics` | confirmation with the new id |
//! | `get_memories` | `query` | memories ranked by title similarity |
//! | `get_topic_timeline` | `topic` | memories of the closest topics, oldest first |
//! | `crystalize_memories` | none | path of the written snapshot |
//! | `clear_memories` | none | confirmation |

pub mod memory;

use std::sync::Arc;

pub use memory::{
    ClearMemoriesTool, CrystalizeMemoriesTool, GetMemoriesTool, GetTopicTimelineTool,
    WriteMemoryTool,
};

use crate::mcp::registry::ToolRegistry;
use crate::store::PensieveStore;

/// Registry holding every memory tool bound to `store`.
pub fn memory_tools(store: &PensieveStore) -> ToolRegistry {
    ToolRegistry::new_empty()
        .with_native_tool(Arc::new(WriteMemoryTool::new(store.clone())))
        .with_native_tool(Arc::new(GetMemoriesTool::new(store.clone())))
        .with_native_tool(Arc::new(GetTopicTimelineTool::new(store.clone())))
        .with_native_tool(Arc::new(CrystalizeMemoriesTool::new(store.clone())))
        .with_native_tool(Arc::new(ClearMemoriesTool::new(store.clone())))
}
