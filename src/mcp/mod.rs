//! MCP (Model Context Protocol) module
//!
//! Provides integration with MCP servers, allowing the agent to connect
//! to external tool providers (media requests through Jellyseerr and
//! friends) that implement the Model Context Protocol.
//!
//! ## Architecture
//!
//! - **client**: MCP client; stdio and streamable HTTP through `rmcp`,
//!   legacy SSE over `reqwest`
//! - **protocol**: Wire protocol types (JSON-RPC based)
//! - **bridge**: Adapts MCP tools into the agent's `Tool` trait
//! - **registry**: Configured servers and connecting to them
//!
//! ## Usage
//!
//! ```rust,no_run
//! use home_agent::config::McpServerConfig;
//! use home_agent::mcp::McpClient;
//!
//! # async fn example() -> home_agent::Result<()> {
//! let config = McpServerConfig::http("jellyseerr", "http://localhost:5056/sse");
//! let client = McpClient::connect(&config).await?;
//!
//! // List available tools
//! let tools = client.list_tools().await?;
//!
//! // Call a tool
//! let result = client.call_tool("search_media", serde_json::json!({"query": "Dune"})).await?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod client;
mod protocol;
mod registry;

pub use bridge::McpToolBridge;
pub use client::{is_sse_url, McpClient};
pub use protocol::{McpRequest, McpResponse, McpTool, McpToolInput, McpToolResult};
pub use registry::McpRegistry;

#[cfg(test)]
pub(crate) use client::test_support;
