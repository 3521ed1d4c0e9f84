//! Domain types shared by the store, the persistence layer and the tool surface.

pub mod memory;

pub use memory::{Memory, MemoryMatch, MemoryView, StoreSummary, Topic, topic_key};
