//! MCP client for connecting to MCP servers
//!
//! Supports three transports:
//! - stdio: spawn a subprocess, driven by `rmcp`
//! - streamable HTTP: POST each message, driven by `rmcp`
//! - SSE: the legacy HTTP transport. A long-lived GET event stream first
//!   names a POST endpoint, then carries the responses as `message` events.
//!   `rmcp` no longer ships a client for it, so it is spoken here directly.

use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use rmcp::model::{ClientInfo, Tool as RmcpTool};
use rmcp::service::RunningService;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceError, ServiceExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::protocol::{
    initialize_params, McpNotification, McpRequest, McpResponse, McpTool, McpToolInput,
    McpToolResult,
};
use crate::config::McpServerConfig;
use crate::error::{Error, Result};
use crate::sse::SseParser;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

enum Connection {
    Service(RunningService<RoleClient, ClientInfo>),
    Sse(SseTransport),
}

/// MCP client for communicating with an MCP server
pub struct McpClient {
    connection: Connection,
    /// Server name
    name: String,
}

impl McpClient {
    /// Connect using whichever transport `config` describes
    pub async fn connect(config: &McpServerConfig) -> Result<Self> {
        if let Some(ref command) = config.command {
            return Self::connect_stdio(&config.name, command, &config.args).await;
        }

        let url = config.url.as_deref().ok_or_else(|| {
            Error::Config(format!("MCP server '{}' has neither url nor command", config.name))
        })?;
        let url = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid MCP url for '{}': {}", config.name, e)))?;

        if is_sse_url(&url) {
            Self::connect_sse(&config.name, url).await
        } else {
            Self::connect_http(&config.name, url).await
        }
    }

    /// Connect to an MCP server via stdio transport
    ///
    /// Spawns the given command as a subprocess and communicates via stdin/stdout.
    pub async fn connect_stdio(name: &str, command: &str, args: &[String]) -> Result<Self> {
        debug!("Connecting to MCP server {}: {} {:?}", name, command, args);
        let mut cmd = Command::new(command);
        cmd.args(args);
        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| Error::Mcp(format!("Failed to spawn MCP server '{}': {}", command, e)))?;

        let service = tokio::time::timeout(CONNECT_TIMEOUT, client_info()?.serve(transport))
            .await
            .map_err(|_| connect_timeout(name))?
            .map_err(|e| Error::Mcp(format!("MCP server {} failed to initialize: {}", name, e)))?;
        Ok(Self::connected(name, Connection::Service(service)))
    }

    /// Connect to an MCP server via the SSE transport
    pub async fn connect_sse(name: &str, url: Url) -> Result<Self> {
        debug!("Connecting to MCP server {} over SSE: {}", name, url);
        let transport = SseTransport::open(name, url).await?;
        transport.initialize().await?;
        Ok(Self::connected(name, Connection::Sse(transport)))
    }

    /// Connect to an MCP server via streamable HTTP
    pub async fn connect_http(name: &str, url: Url) -> Result<Self> {
        debug!("Connecting to MCP server {} over HTTP: {}", name, url);
        let transport = StreamableHttpClientTransport::from_uri(url.as_str());

        let service = tokio::time::timeout(CONNECT_TIMEOUT, client_info()?.serve(transport))
            .await
            .map_err(|_| connect_timeout(name))?
            .map_err(|e| Error::Mcp(format!("MCP server {} failed to initialize: {}", name, e)))?;
        Ok(Self::connected(name, Connection::Service(service)))
    }

    fn connected(name: &str, connection: Connection) -> Self {
        info!("Connected to MCP server {}", name);
        McpClient {
            connection,
            name: name.to_string(),
        }
    }

    /// List available tools from the MCP server
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let tools = match &self.connection {
            Connection::Service(service) => {
                let tools = tokio::time::timeout(REQUEST_TIMEOUT, service.list_all_tools())
                    .await
                    .map_err(|_| self.request_timeout())?
                    .map_err(|e| self.service_error(e))?;
                tools
                    .into_iter()
                    .map(from_rmcp_tool)
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| Error::Mcp(format!("Invalid tool list from {}: {}", self.name, e)))?
            }
            Connection::Sse(transport) => {
                let result = transport.send(McpRequest::list_tools(transport.next_id())).await?;
                match result.get("tools") {
                    Some(tools) => serde_json::from_value(tools.clone()).map_err(|e| {
                        Error::Mcp(format!("Invalid tool list from {}: {}", self.name, e))
                    })?,
                    None => Vec::new(),
                }
            }
        };

        debug!("MCP server {} has {} tools", self.name, tools.len());
        Ok(tools)
    }

    /// Call a tool on the MCP server
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        debug!("MCP tools/call -> {}: {}", self.name, name);
        let tool_result = match &self.connection {
            Connection::Service(service) => {
                let mut params = serde_json::json!({ "name": name });
                if !arguments.is_null() {
                    params["arguments"] = arguments;
                }
                let params = serde_json::from_value(params)
                    .map_err(|e| Error::InvalidInput(format!("Invalid arguments for {}: {}", name, e)))?;

                let result = tokio::time::timeout(REQUEST_TIMEOUT, service.call_tool(params))
                    .await
                    .map_err(|_| self.request_timeout())?
                    .map_err(|e| self.service_error(e))?;
                McpToolResult {
                    content: serde_json::from_value(serde_json::to_value(&result.content)?)
                        .map_err(|e| Error::Mcp(format!("Failed to parse MCP tool result: {}", e)))?,
                    is_error: result.is_error.unwrap_or(false),
                }
            }
            Connection::Sse(transport) => {
                let request = McpRequest::call_tool(transport.next_id(), name, arguments);
                let result = transport.send(request).await?;
                serde_json::from_value(result)
                    .map_err(|e| Error::Mcp(format!("Failed to parse MCP tool result: {}", e)))?
            }
        };

        if tool_result.is_error {
            warn!("MCP tool {} returned error", name);
        }

        Ok(tool_result)
    }

    /// Get the server name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn service_error(&self, err: ServiceError) -> Error {
        match err {
            ServiceError::McpError(e) => Error::Mcp(format!(
                "MCP error from {}: {} (code {})",
                self.name, e.message, e.code.0
            )),
            other => Error::Mcp(format!("MCP server {} failed: {}", self.name, other)),
        }
    }

    fn request_timeout(&self) -> Error {
        Error::Timeout(format!("MCP server {} did not answer", self.name))
    }
}

/// Whether `url` names a legacy SSE endpoint
pub fn is_sse_url(url: &Url) -> bool {
    url.path().trim_end_matches('/').ends_with("/sse")
}

fn client_info() -> Result<ClientInfo> {
    Ok(serde_json::from_value(initialize_params())?)
}

fn connect_timeout(name: &str) -> Error {
    Error::Timeout(format!("MCP server {} did not finish the handshake", name))
}

fn from_rmcp_tool(tool: RmcpTool) -> Result<McpTool> {
    let input_schema: McpToolInput =
        serde_json::from_value(Value::Object((*tool.input_schema).clone()))?;
    Ok(McpTool {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        input_schema,
    })
}

// ============================================================================
// Legacy SSE
// ============================================================================

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<McpResponse>>>>;

struct SseTransport {
    http: Client,
    endpoint: Url,
    pending: Pending,
    reader: JoinHandle<()>,
    next_id: AtomicU64,
    name: String,
}

impl SseTransport {
    async fn open(name: &str, url: Url) -> Result<Self> {
        // No client-wide timeout: the event stream stays open for the
        // lifetime of the connection
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        let response = http
            .get(url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Mcp(format!("MCP server {} refused SSE stream: HTTP {}", name, status)));
        }

        let pending: Pending = Arc::default();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(read_events(
            name.to_string(),
            response.bytes_stream(),
            endpoint_tx,
            Arc::clone(&pending),
        ));

        let endpoint = match tokio::time::timeout(CONNECT_TIMEOUT, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(Error::Mcp(format!(
                    "MCP server {} closed the stream before naming an endpoint",
                    name
                )))
            }
            Err(_) => {
                reader.abort();
                return Err(connect_timeout(name));
            }
        };
        let endpoint = url
            .join(&endpoint)
            .map_err(|e| Error::Mcp(format!("Invalid endpoint '{}' from {}: {}", endpoint, name, e)))?;
        debug!("MCP server {} posts to {}", name, endpoint);

        Ok(SseTransport {
            http,
            endpoint,
            pending,
            reader,
            next_id: AtomicU64::new(1),
            name: name.to_string(),
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<()> {
        let result = self.send(McpRequest::initialize(self.next_id())).await?;
        debug!("MCP server {} initialized: {:?}", self.name, result);
        self.post(&McpNotification::initialized()).await
    }

    /// Send a request and return its result, failing on a JSON-RPC error
    async fn send(&self, request: McpRequest) -> Result<Value> {
        debug!("MCP request -> {}: {}", self.name, request.method);
        let response = self.exchange(&request).await?;

        if let Some(ref err) = response.error {
            return Err(Error::Mcp(format!(
                "MCP error from {}: {} (code {})",
                self.name, err.message, err.code
            )));
        }
        Ok(response.result.unwrap_or_default())
    }

    async fn exchange(&self, request: &McpRequest) -> Result<McpResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request.id, tx);

        if let Err(e) = self.post(request).await {
            self.pending.lock().await.remove(&request.id);
            return Err(e);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Mcp(format!("MCP server {} closed the stream", self.name))),
            Err(_) => {
                self.pending.lock().await.remove(&request.id);
                Err(Error::Timeout(format!("MCP server {} did not answer", self.name)))
            }
        }
    }

    async fn post(&self, body: &impl Serialize) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Mcp(format!(
                "MCP server {} rejected message: HTTP {}",
                self.name, status
            )))
        }
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route events from the SSE stream: the first `endpoint` event goes to
/// `endpoint_tx`, responses go to their waiting requests
async fn read_events<S, B, E>(
    name: String,
    stream: S,
    endpoint_tx: oneshot::Sender<String>,
    pending: Pending,
) where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = Box::pin(stream);
    let mut parser = SseParser::new();
    let mut endpoint_tx = Some(endpoint_tx);

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("SSE stream from MCP server {} failed: {}", name, e);
                break;
            }
        };

        for event in parser.push(chunk.as_ref()) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(event.data);
                    }
                }
                "message" => match McpResponse::parse(&event.data) {
                    Some(response) => {
                        let waiter = match response.id {
                            Some(id) => pending.lock().await.remove(&id),
                            None => None,
                        };
                        match waiter {
                            Some(tx) => {
                                let _ = tx.send(response);
                            }
                            None => debug!("Unmatched MCP response from {}: {:?}", name, response.id),
                        }
                    }
                    None => debug!("Ignoring MCP message from {}: {}", name, event.data),
                },
                other => debug!("Ignoring SSE event '{}' from {}", other, name),
            }
        }
    }

    warn!("SSE stream from MCP server {} ended", name);
    // Dropping the senders fails every waiting request
    pending.lock().await.clear();
}


#[cfg(test)]
mod tests {
    use super::test_support::{mount_handshake, mount_tools, rpc_error, rpc_result};
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_config(server: &MockServer) -> McpServerConfig {
        McpServerConfig::http("test", format!("{}/mcp", server.uri()))
    }

    #[test]
    fn test_sse_url_detection() {
        assert!(is_sse_url(&Url::parse("http://localhost:5056/sse").unwrap()));
        assert!(is_sse_url(&Url::parse("http://localhost:5056/sse/").unwrap()));
        assert!(!is_sse_url(&Url::parse("http://localhost:5056/mcp").unwrap()));
        assert!(!is_sse_url(&Url::parse("http://localhost:5056/ssel").unwrap()));
    }

    #[test]
    fn test_client_info_identifies_home_agent() {
        let info = client_info().unwrap();
        assert_eq!(info.client_info.name, "home-agent");
    }

    #[tokio::test]
    async fn test_http_list_and_call_tools() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        mount_tools(
            &server,
            json!([{
                "name": "search_media",
                "description": "Search",
                "inputSchema": {
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }
            }]),
        )
        .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "tools/call",
                "params": {"name": "search_media", "arguments": {"query": "Dune"}}
            })))
            .respond_with(rpc_result(json!({
                "content": [{"type": "text", "text": "Dune (2021)"}]
            })))
            .mount(&server)
            .await;

        let client = McpClient::connect(&http_config(&server)).await.unwrap();
        assert_eq!(client.name(), "test");

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search_media");
        assert_eq!(tools[0].description, "Search");
        assert_eq!(tools[0].input_schema.required, vec!["query"]);

        let result = client
            .call_tool("search_media", json!({"query": "Dune"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "Dune (2021)");
    }

    #[tokio::test]
    async fn test_http_json_rpc_error() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(rpc_error(-32602, "Unknown tool"))
            .mount(&server)
            .await;

        let client = McpClient::connect(&http_config(&server)).await.unwrap();
        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Mcp(ref m) if m.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn test_http_server_error_fails_connect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = McpClient::connect(&http_config(&server)).await.err().unwrap();
        assert!(matches!(err, Error::Mcp(_)));
    }

    #[tokio::test]
    async fn test_missing_transport_is_config_error() {
        let config = McpServerConfig {
            url: None,
            ..McpServerConfig::http("empty", "http://unused")
        };
        let err = McpClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_sse_stream_refused_fails_connect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = McpServerConfig::http("legacy", format!("{}/sse", server.uri()));
        let err = McpClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, Error::Mcp(ref m) if m.contains("refused SSE stream")));
    }

    #[tokio::test]
    async fn test_sse_reader_routes_endpoint_and_responses() {
        let pending: Pending = Arc::default();
        let (waiter_tx, waiter_rx) = oneshot::channel();
        pending.lock().await.insert(7, waiter_tx);
        let (dropped_tx, dropped_rx) = oneshot::channel();
        pending.lock().await.insert(8, dropped_tx);

        let chunks = vec![
            "event: endpoint\ndata: /messages/?session_id=abc\n\n",
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n",
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":7,",
            "\"result\":{\"ok\":true}}\n\n",
        ];
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        read_events(
            "test".to_string(),
            futures::stream::iter(chunks.into_iter().map(Ok::<_, String>)),
            endpoint_tx,
            Arc::clone(&pending),
        )
        .await;

        assert_eq!(endpoint_rx.await.unwrap(), "/messages/?session_id=abc");
        let response = waiter_rx.await.unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
        // the stream ended, so request 8 can never be answered
        assert!(dropped_rx.await.is_err());
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stdio_handshake_and_list() {
        // Answers each request with the id it was sent
        let script = r#"
reply() {
    id=$(printf '%s' "$1" | sed 's/.*"id":\([0-9]*\).*/\1/')
    printf '{"jsonrpc":"2.0","id":%s,"result":%s}\n' "$id" "$2"
}
read -r line
reply "$line" '{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh","version":"1"}}'
read -r line
read -r line
reply "$line" '{"tools":[{"name":"status","inputSchema":{"type":"object"}}]}'
read -r line
"#;
        let config = McpServerConfig {
            name: "shell".to_string(),
            url: None,
            command: Some("sh".to_string()),
            args: vec!["-c".to_string(), script.to_string()],
            enabled: true,
        };

        let client = McpClient::connect(&config).await.unwrap();
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "status");
        assert_eq!(tools[0].input_schema.schema_type, "object");
    }

    #[tokio::test]
    async fn test_stdio_missing_command_fails() {
        let err = McpClient::connect_stdio("ghost", "/nonexistent/mcp-server", &[])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Mcp(ref m) if m.contains("Failed to spawn")));
    }
}
