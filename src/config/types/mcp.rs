//! MCP tool server configuration types

use serde::{Deserialize, Serialize};

/// MCP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Host of the bundled Jellyseerr MCP server
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the bundled Jellyseerr MCP server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Register the bundled Jellyseerr MCP server
    #[serde(default = "default_true")]
    pub jellyseerr: bool,
    /// Additional MCP servers
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

impl Default for McpConfig {
    fn default() -> Self {
        McpConfig {
            host: default_host(),
            port: default_port(),
            jellyseerr: true,
            servers: Vec::new(),
        }
    }
}

impl McpConfig {
    /// Configuration of the bundled Jellyseerr server
    pub fn jellyseerr_server(&self) -> McpServerConfig {
        McpServerConfig {
            name: "jellyseerr".to_string(),
            url: Some(format!("http://{}:{}/sse", self.host, self.port)),
            command: None,
            args: Vec::new(),
            enabled: self.jellyseerr,
        }
    }

    /// Every configured server, bundled ones first
    pub fn all_servers(&self) -> Vec<McpServerConfig> {
        let mut servers = vec![self.jellyseerr_server()];
        servers.extend(self.servers.iter().cloned());
        servers
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5056
}

fn default_true() -> bool {
    true
}

/// A single MCP server
///
/// Either `url` (HTTP; a path ending in `/sse` selects the SSE transport) or
/// `command` (stdio) must be set. When both are present stdio wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server identifier (e.g. "jellyseerr")
    pub name: String,
    /// HTTP endpoint
    pub url: Option<String>,
    /// Command to spawn for stdio transport
    pub command: Option<String>,
    /// Arguments for `command`
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether this server is active
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl McpServerConfig {
    /// An HTTP server
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        McpServerConfig {
            name: name.into(),
            url: Some(url.into()),
            command: None,
            args: Vec::new(),
            enabled: true,
        }
    }

    /// Disable this server
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
