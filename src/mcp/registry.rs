use anyhow::anyhow;
use async_trait::async_trait;
use rmcp::model::Tool;
use std::{collections::HashMap, sync::Arc};

#[async_trait]
pub trait NativeTool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> serde_json::Value;
    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

/// The tools this process serves, in registration order.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<Vec<Tool>>,
    native_tools: Arc<HashMap<String, Arc<dyn NativeTool>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl ToolRegistry {
    pub fn new_empty() -> Self {
        Self {
            tools: Arc::new(Vec::new()),
            native_tools: Arc::new(HashMap::new()),
        }
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn with_native_tool(self, tool: Arc<dyn NativeTool>) -> Self {
        let name = tool.name().to_string();

        let mut tools: Vec<Tool> = self
            .tools
            .iter()
            .filter(|t| t.name != name)
            .cloned()
            .collect();
        let mcp_tool = Tool {
            name: name.clone().into(),
            description: Some(tool.description().to_string().into()),
            input_schema: Arc::new(
                tool.schema()
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            ),
            title: None,
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        };
        tools.push(mcp_tool);

        let mut native_tools = (*self.native_tools).clone();
        native_tools.insert(name, tool);

        Self {
            tools: Arc::new(tools),
            native_tools: Arc::new(native_tools),
        }
    }

    /// Tool descriptors as advertised by `tools/list`.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.native_tools.contains_key(name)
    }

    /// Execute a registered tool.
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let tool = self
            .native_tools
            .get(name)
            .ok_or_else(|| anyhow!("unknown tool: {name}"))?;
        tool.call(arguments).await
    }
}
