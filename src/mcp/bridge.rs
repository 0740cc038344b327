//! MCP-to-Tool bridge
//!
//! Adapts MCP server tools into the agent's `Tool` trait so they can
//! be registered in the `ToolRegistry` alongside the profile tools.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::client::McpClient;
use super::protocol::McpTool;
use crate::agent::{Tool, ToolResult, TurnContext};
use crate::error::Result;

/// Bridge that wraps an MCP tool as an agent Tool
pub struct McpToolBridge {
    /// Reference to the MCP client
    client: Arc<McpClient>,
    /// The MCP tool definition
    tool: McpTool,
}

impl McpToolBridge {
    /// Create a new bridge for a specific MCP tool
    pub fn new(client: Arc<McpClient>, tool: McpTool) -> Self {
        McpToolBridge { client, tool }
    }

    /// Create bridges for all tools from an MCP server
    pub async fn from_server(client: Arc<McpClient>) -> Result<Vec<Self>> {
        let tools = client.list_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| McpToolBridge::new(Arc::clone(&client), tool))
            .collect())
    }

    /// Name of the server providing this tool
    pub fn server(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl Tool for McpToolBridge {
    fn name(&self) -> &str {
        &self.tool.name
    }

    fn description(&self) -> &str {
        &self.tool.description
    }

    fn parameters_schema(&self) -> Value {
        self.tool.input_schema.to_schema()
    }

    async fn execute(&self, _ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        match self.client.call_tool(&self.tool.name, args).await {
            Ok(result) if result.is_error => Ok(ToolResult::failure(result.text())),
            Ok(result) => Ok(ToolResult::success(result.text())),
            Err(e) => {
                warn!("MCP tool {} on {} failed: {}", self.tool.name, self.server(), e);
                Ok(ToolResult::failure(format!(
                    "MCP tool '{}' failed: {}",
                    self.tool.name, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpServerConfig;
    use crate::database::test_support::temp_store;
    use crate::mcp::test_support::{mount_handshake, mount_tools, rpc_result};
    use crate::profile::ProfileManager;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer};

    async fn mock_server() -> MockServer {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        mount_tools(
            &server,
            json!([{
                "name": "request_media",
                "description": "Request a movie or series",
                "inputSchema": {
                    "type": "object",
                    "properties": {"media_id": {"type": "integer"}},
                    "required": ["media_id"]
                }
            }]),
        )
        .await;
        server
    }

    #[tokio::test]
    async fn test_bridge_exposes_and_calls_tool() {
        let server = mock_server().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(rpc_result(json!({
                "content": [{"type": "text", "text": "Already requested"}],
                "isError": true
            })))
            .mount(&server)
            .await;

        let config = McpServerConfig::http("jellyseerr", format!("{}/mcp", server.uri()));
        let client = Arc::new(McpClient::connect(&config).await.unwrap());
        let bridges = McpToolBridge::from_server(client).await.unwrap();
        assert_eq!(bridges.len(), 1);

        let bridge = &bridges[0];
        assert_eq!(bridge.server(), "jellyseerr");
        let definition = bridge.to_definition();
        assert_eq!(definition.function.name, "request_media");
        assert_eq!(definition.function.parameters["required"], json!(["media_id"]));

        let (store, _dir) = temp_store().await;
        let profiles = ProfileManager::new(Arc::new(store));
        let mut ctx = TurnContext::new(profiles.get(1, None).await.unwrap(), profiles);

        let result = bridge.execute(&mut ctx, json!({"media_id": 42})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.to_string(), "Error: Already requested");
    }
}
