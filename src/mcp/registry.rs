//! Registry of configured MCP servers

use std::sync::Arc;
use tracing::{info, warn};

use super::bridge::McpToolBridge;
use super::client::McpClient;
use crate::config::McpServerConfig;

/// Configured MCP servers, keyed by name in registration order
#[derive(Debug, Clone, Default)]
pub struct McpRegistry {
    servers: Vec<McpServerConfig>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every server in `servers`
    pub fn from_configs(servers: impl IntoIterator<Item = McpServerConfig>) -> Self {
        let mut registry = Self::new();
        for server in servers {
            registry.register(server);
        }
        registry
    }

    /// Add a server; a server with the same name is replaced in place
    pub fn register(&mut self, config: McpServerConfig) {
        match self.servers.iter_mut().find(|s| s.name == config.name) {
            Some(existing) => *existing = config,
            None => self.servers.push(config),
        }
    }

    pub fn servers(&self) -> &[McpServerConfig] {
        &self.servers
    }

    /// Names of the enabled servers
    pub fn tool_names(&self) -> Vec<&str> {
        self.enabled().map(|s| s.name.as_str()).collect()
    }

    fn enabled(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }

    /// Connect to every enabled server and bridge its tools
    ///
    /// A server that cannot be reached is logged and skipped so the agent
    /// still starts with whatever is available.
    pub async fn connect_all(&self) -> Vec<McpToolBridge> {
        let mut bridges = Vec::new();
        for server in self.enabled() {
            let client = match McpClient::connect(server).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!("Skipping MCP server {}: {}", server.name, e);
                    continue;
                }
            };

            match McpToolBridge::from_server(client).await {
                Ok(tools) => {
                    info!("MCP server {} provides {} tools", server.name, tools.len());
                    bridges.extend(tools);
                }
                Err(e) => warn!("Failed to list tools of MCP server {}: {}", server.name, e),
            }
        }
        bridges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Tool;
    use crate::mcp::test_support::{mount_handshake, mount_tools};
    use serde_json::json;
    use wiremock::MockServer;

    #[test]
    fn test_registry_starts_empty() {
        let registry = McpRegistry::new();
        assert!(registry.servers().is_empty());
        assert!(registry.tool_names().is_empty());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = McpRegistry::new();
        registry.register(McpServerConfig::http("jellyseerr", "http://localhost:5056/sse"));
        registry.register(McpServerConfig::http("jellyseerr", "http://other:5056/sse"));

        assert_eq!(registry.servers().len(), 1);
        assert_eq!(registry.servers()[0].url.as_deref(), Some("http://other:5056/sse"));
    }

    #[test]
    fn test_tool_names_excludes_disabled() {
        let registry = McpRegistry::from_configs([
            McpServerConfig::http("jellyseerr", "http://localhost:5056/mcp"),
            McpServerConfig::http("glances", "http://localhost:5057/mcp").disabled(),
        ]);
        assert_eq!(registry.tool_names(), vec!["jellyseerr"]);
    }

    #[tokio::test]
    async fn test_connect_all_skips_unreachable_and_disabled() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        mount_tools(
            &server,
            json!([
                {"name": "search_media", "inputSchema": {"type": "object"}},
                {"name": "request_media", "inputSchema": {"type": "object"}}
            ]),
        )
        .await;

        let registry = McpRegistry::from_configs([
            McpServerConfig::http("jellyseerr", format!("{}/mcp", server.uri())),
            McpServerConfig::http("down", "http://127.0.0.1:9/mcp"),
            McpServerConfig::http("off", "http://127.0.0.1:9/mcp").disabled(),
        ]);

        let tools = registry.connect_all().await;
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["search_media", "request_media"]);
    }
}
