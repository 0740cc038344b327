//! MCP wire protocol types
//!
//! Based on the Model Context Protocol specification (JSON-RPC 2.0).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision sent in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Parameters of `initialize`: protocol revision and who we are
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "home-agent",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// JSON-RPC request to an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    /// Create a new MCP request
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Create an initialize request
    pub fn initialize(id: u64) -> Self {
        Self::new(id, "initialize", Some(initialize_params()))
    }

    /// Create a tools/list request
    pub fn list_tools(id: u64) -> Self {
        Self::new(id, "tools/list", None)
    }

    /// Create a tools/call request
    pub fn call_tool(id: u64, name: impl Into<String>, arguments: Value) -> Self {
        Self::new(
            id,
            "tools/call",
            Some(serde_json::json!({
                "name": name.into(),
                "arguments": arguments
            })),
        )
    }
}

/// JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpNotification {
    /// Sent once the initialize handshake completed
    pub fn initialized() -> Self {
        McpNotification {
            jsonrpc: "2.0".to_string(),
            method: "notifications/initialized".to_string(),
            params: None,
        }
    }
}

/// JSON-RPC response from an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Parse a server message, returning `None` for anything that is not a
    /// response (server requests, notifications, malformed JSON)
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        if value.get("method").is_some() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

/// MCP error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Tool definition from an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: String,
    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema", default)]
    pub input_schema: McpToolInput,
}

/// Tool input schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolInput {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for McpToolInput {
    fn default() -> Self {
        McpToolInput {
            schema_type: default_schema_type(),
            properties: Value::Null,
            required: Vec::new(),
        }
    }
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl McpToolInput {
    /// The schema as a JSON Schema object
    pub fn to_schema(&self) -> Value {
        let properties = if self.properties.is_object() {
            self.properties.clone()
        } else {
            Value::Object(Default::default())
        };
        serde_json::json!({
            "type": self.schema_type,
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Content block returned by a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// Result of a tools/call response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    #[serde(default)]
    pub content: Vec<McpContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl McpToolResult {
    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
