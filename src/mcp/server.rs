use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::mcp::registry::ToolRegistry;
use crate::store::PensieveStore;
use crate::tools::memory_tools;

/// URI of the store summary resource.
pub const MEMORY_RESOURCE_URI: &str = "memory://";

const INSTRUCTIONS: &str = "Pensieve keeps the user's memories. Write a memory whenever the \
user shares something worth remembering, and look memories up before answering questions \
about the user's past.";

/// MCP handler serving the memory tools and the summary resource.
#[derive(Debug, Clone)]
pub struct PensieveServer {
    store: PensieveStore,
    registry: ToolRegistry,
}

impl PensieveServer {
    pub fn new(store: PensieveStore) -> Self {
        let registry = memory_tools(&store);
        Self { store, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one tool call.
    ///
    /// Unknown tools are protocol errors. Anything the tool itself rejects,
    /// including malformed arguments, comes back as an error result the model
    /// can read.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        if !self.registry.contains(name) {
            return Err(McpError::invalid_params(format!("unknown tool: {name}"), None));
        }

        let args = Value::Object(arguments.unwrap_or_default());
        match self.registry.call(name, args).await {
            Ok(value) => {
                debug!(name: "mcp.tool.called", tool = %name, "Tool call succeeded");
                Ok(CallToolResult::success(vec![Content::text(render(value))]))
            }
            Err(error) => {
                warn!(name: "mcp.tool.failed", tool = %name, error = %format!("{error:#}"), "Tool call failed");
                Ok(CallToolResult::error(vec![Content::text(format!("{error:#}"))]))
            }
        }
    }

    pub fn memory_resource() -> Resource {
        let mut raw = RawResource::new(MEMORY_RESOURCE_URI, "memory");
        raw.description = Some("Titles of all memories and names of all topics".to_string());
        raw.mime_type = Some("application/json".to_string());
        raw.no_annotation()
    }

    /// Contents of the summary resource.
    pub async fn read_memory_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        if uri != MEMORY_RESOURCE_URI {
            return Err(McpError::resource_not_found(
                format!("unknown resource: {uri}"),
                None,
            ));
        }
        let summary = self.store.summary().await;
        let text = serde_json::to_string(&summary)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}

/// Strings go out as-is; everything else as compact JSON.
fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl ServerHandler for PensieveServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.registry.tools().to_vec()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        info!(name: "mcp.tool.call", tool = %request.name, "Tool call received");
        self.dispatch(&request.name, request.arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(vec![
            Self::memory_resource(),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_memory_resource(&request.uri).await
    }
}
