//! Inspection client: spawns a memory server over stdio and reports what it offers.

use anyhow::{Context, anyhow, bail};
use rmcp::{
    model::{ReadResourceRequestParam, ResourceContents, Tool},
    service::ServiceExt,
    transport::TokioChildProcess,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{info, warn};

use crate::mcp::server::MEMORY_RESOURCE_URI;

const SUPPORTED_TYPES: &[&str] = &["string", "integer", "number", "boolean", "array", "object"];

/// What a server advertised.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub server: Option<String>,
    pub tools: Vec<String>,
    pub resources: Vec<String>,
    /// Parsed `memory://` contents, if the server exposes it.
    pub memory: Option<Value>,
    pub function_declarations: Vec<Value>,
}

/// Connect to the server started by `cmd`, list everything, then disconnect.
pub async fn inspect(cmd: Command) -> anyhow::Result<InspectReport> {
    let transport = TokioChildProcess::new(cmd).context("failed to spawn MCP server")?;
    let client = ()
        .serve(transport)
        .await
        .context("failed to initialize MCP session")?;

    let server = client
        .peer_info()
        .map(|info| format!("{} {}", info.server_info.name, info.server_info.version));

    let tools = client
        .list_tools(Default::default())
        .await
        .context("tools/list failed")?
        .tools;
    let resources: Vec<String> = client
        .list_resources(Default::default())
        .await
        .context("resources/list failed")?
        .resources
        .into_iter()
        .map(|r| r.raw.uri)
        .collect();

    let memory = if resources.iter().any(|uri| uri == MEMORY_RESOURCE_URI) {
        let read = client
            .read_resource(ReadResourceRequestParam {
                uri: MEMORY_RESOURCE_URI.to_string(),
            })
            .await
            .context("resources/read failed")?;
        read.contents
            .into_iter()
            .find_map(|c| match c {
                ResourceContents::TextResourceContents { text, .. } => Some(text),
                _ => None,
            })
            .map(|text| serde_json::from_str::<Value>(&text))
            .transpose()
            .context("memory resource is not valid JSON")?
    } else {
        None
    };

    info!(
        name: "inspect.done",
        tools = tools.len(),
        resources = resources.len(),
        "Server inspected"
    );

    let report = InspectReport {
        server,
        tools: tools.iter().map(|t| t.name.to_string()).collect(),
        resources,
        memory,
        function_declarations: function_declarations(&tools),
    };

    if let Err(error) = client.cancel().await {
        warn!(%error, "MCP session did not shut down cleanly");
    }
    Ok(report)
}

/// Function-calling declarations for `tools`. A tool whose input schema
/// cannot be expressed is skipped with a warning.
pub fn function_declarations(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| match function_declaration(tool) {
            Ok(decl) => Some(decl),
            Err(error) => {
                warn!(
                    name: "inspect.tool.skipped",
                    tool = %tool.name,
                    error = %error,
                    "Skipping tool with unsupported schema"
                );
                None
            }
        })
        .collect()
}

pub fn function_declaration(tool: &Tool) -> anyhow::Result<Value> {
    let params = Value::Object((*tool.input_schema).clone());
    if params.get("type").and_then(Value::as_str) != Some("object") {
        bail!("input schema must be an object schema");
    }
    check_schema(&params, "$")?;

    Ok(json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description.as_deref().unwrap_or(""),
            "parameters": params
        }
    }))
}

fn check_schema(schema: &Value, at: &str) -> anyhow::Result<()> {
    let obj = schema
        .as_object()
        .ok_or_else(|| anyhow!("{at}: schema is not an object"))?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("{at}: missing or non-string \"type\""))?;
    if !SUPPORTED_TYPES.contains(&ty) {
        bail!("{at}: unsupported type \"{ty}\"");
    }

    match ty {
        "object" => {
            let props = match obj.get("properties") {
                None => None,
                Some(Value::Object(props)) => Some(props),
                Some(_) => bail!("{at}: \"properties\" is not an object"),
            };
            for (name, prop) in props.into_iter().flatten() {
                check_schema(prop, &format!("{at}.{name}"))?;
            }
            if let Some(required) = obj.get("required") {
                let names = required
                    .as_array()
                    .ok_or_else(|| anyhow!("{at}: \"required\" is not an array"))?;
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| anyhow!("{at}: \"required\" holds a non-string"))?;
                    if !props.is_some_and(|p| p.contains_key(name)) {
                        bail!("{at}: required property \"{name}\" is not declared");
                    }
                }
            }
        }
        "array" => {
            let items = obj
                .get("items")
                .ok_or_else(|| anyhow!("{at}: array without \"items\""))?;
            check_schema(items, &format!("{at}[]"))?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tool(name: &str, schema: Value) -> Tool {
        Tool {
            name: name.to_string().into(),
            description: Some(format!("{name} tool").into()),
            input_schema: Arc::new(schema.as_object().unwrap().clone()),
            title: None,
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }

    #[test]
    fn test_declaration_carries_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "topics": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["topics"]
        });
        let decl = function_declaration(&tool("write", schema.clone())).unwrap();
        assert_eq!(decl["function"]["name"], "write");
        assert_eq!(decl["function"]["description"], "write tool");
        assert_eq!(decl["function"]["parameters"], schema);
    }

    #[test]
    fn test_unconvertible_tools_are_skipped() {
        let tools = vec![
            tool("good", json!({ "type": "object", "properties": {} })),
            tool(
                "bad_type",
                json!({ "type": "object", "properties": { "x": { "type": "tuple" } } }),
            ),
            tool(
                "bad_array",
                json!({ "type": "object", "properties": { "x": { "type": "array" } } }),
            ),
            tool(
                "bad_required",
                json!({ "type": "object", "properties": {}, "required": ["y"] }),
            ),
            tool("not_object", json!({ "type": "string" })),
        ];

        let decls = function_declarations(&tools);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0]["function"]["name"], "good");
    }
}
