//! Model Context Protocol (MCP) surface.
//!
//! - [`server`]: the `rmcp` server handler exposing the memory tools and the
//!   `memory://` summary resource over stdio
//! - [`registry`]: the [`registry::NativeTool`] trait and the tool registry
//! - [`client`]: a small client that spawns a server, lists what it offers and
//!   converts tool schemas to function-calling declarations

pub mod client;
pub mod registry;
pub mod server;

pub use registry::{NativeTool, ToolRegistry};
pub use server::{MEMORY_RESOURCE_URI, PensieveServer};
