//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to a proper MCP server surface that Cursor
//! and other MCP clients speak natively. Tools are exposed via `list_tools`
//! / `call_tool` with the same schemas and validation as the HTTP API.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::traits::{validate_params, AppState, ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP JSON-RPC protocol.
///
/// Each MCP session receives a clone of this struct (everything is behind
/// `Arc`), so all sessions share the same tool set and application state.
#[derive(Clone)]
pub struct McpBridge {
    state: Arc<AppState>,
    tools: Arc<ToolRegistry>,
    extra_tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(
        state: Arc<AppState>,
        tools: Arc<ToolRegistry>,
        extra_tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            state,
            tools,
            extra_tools,
        }
    }

    fn find_tool(&self, name: &str) -> Option<&dyn crate::traits::Tool> {
        self.tools
            .find(name)
            .or_else(|| self.extra_tools.find(name))
    }

    /// Convert a registered tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let schema_value = tool.parameters_schema();
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema_value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: None,
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "quarry".to_string(),
                title: Some("Quarry".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Quarry — a knowledge-source registry and retrieval server. \
                 Index repositories, documentation pages, and installed packages \
                 with the index_* tools, search them with search_codebase and \
                 search_documentation, and fall back to web_search or \
                 deep_research for anything not indexed locally."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let mut tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        for t in self.extra_tools.tools() {
            tools.push(Self::to_mcp_tool(t.as_ref()));
        }
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.find_tool(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.find_tool(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let params = validate_params(&tool.parameters_schema(), &params)
            .map_err(|e| McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None))?;

        let ctx = ToolContext::new(self.state.clone());
        match tool.execute(params, &ctx).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::WebSearchTool;

    #[test]
    fn test_tool_descriptor_conversion() {
        let descriptor = McpBridge::to_mcp_tool(&WebSearchTool);
        assert_eq!(descriptor.name, "web_search");
        assert!(descriptor.description.is_some());
        assert!(descriptor.input_schema.contains_key("properties"));
    }
}
