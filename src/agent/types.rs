//! Type definitions for the agent module
//!
//! Two layers live here: the structured conversation log ([`ModelMessage`]
//! and its parts) that is persisted and windowed, and the OpenRouter wire
//! types it is converted to for each model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

// ============================================================================
// Conversation log
// ============================================================================

/// One unit of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelMessage {
    /// User-authored turn (prompt and/or tool results)
    Request(ModelRequest),
    /// Model-authored turn (text and/or tool calls)
    Response(ModelResponse),
}

impl ModelMessage {
    /// Storage role: `request` or `response`
    pub fn role(&self) -> &'static str {
        match self {
            ModelMessage::Request(_) => "request",
            ModelMessage::Response(_) => "response",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, ModelMessage::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, ModelMessage::Response(_))
    }
}

impl From<ModelRequest> for ModelMessage {
    fn from(request: ModelRequest) -> Self {
        ModelMessage::Request(request)
    }
}

impl From<ModelResponse> for ModelMessage {
    fn from(response: ModelResponse) -> Self {
        ModelMessage::Response(response)
    }
}

/// A request sent to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub parts: Vec<RequestPart>,
}

impl ModelRequest {
    /// Create a request from parts
    pub fn new(parts: Vec<RequestPart>) -> Self {
        ModelRequest { parts }
    }

    /// A request carrying a single user prompt
    pub fn user(content: impl Into<String>) -> Self {
        ModelRequest::new(vec![RequestPart::UserPrompt {
            content: content.into(),
        }])
    }

    /// A request opening a turn: system prompt followed by the user prompt
    pub fn with_system(system: impl Into<String>, content: impl Into<String>) -> Self {
        ModelRequest::new(vec![
            RequestPart::SystemPrompt {
                content: system.into(),
            },
            RequestPart::UserPrompt {
                content: content.into(),
            },
        ])
    }
}

/// A part of a [`ModelRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "snake_case")]
pub enum RequestPart {
    SystemPrompt {
        content: String,
    },
    UserPrompt {
        content: String,
    },
    /// Result of a tool call made in the preceding response
    ToolReturn {
        tool_call_id: String,
        tool_name: String,
        content: String,
    },
}

/// A response produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ModelResponse {
    /// Create a response from parts, stamped now
    pub fn new(parts: Vec<ResponsePart>) -> Self {
        ModelResponse {
            parts,
            model_name: None,
            timestamp: Utc::now(),
        }
    }

    /// A plain text response
    pub fn from_text(content: impl Into<String>) -> Self {
        ModelResponse::new(vec![ResponsePart::Text {
            content: content.into(),
        }])
    }

    /// Set the model that produced this response
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text { content } => Some(content.as_str()),
                ResponsePart::ToolCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls requested by this response, in order
    pub fn tool_calls(&self) -> Vec<ToolCallPart<'_>> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::ToolCall {
                    tool_call_id,
                    tool_name,
                    arguments,
                } => Some(ToolCallPart {
                    id: tool_call_id,
                    name: tool_name,
                    arguments,
                }),
                ResponsePart::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ResponsePart::ToolCall { .. }))
    }
}

/// A part of a [`ModelResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "snake_case")]
pub enum ResponsePart {
    Text {
        content: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
}

/// Borrowed view of a tool call part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolCallPart<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub arguments: &'a Value,
}

// ============================================================================
// OpenRouter wire types
// ============================================================================

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing context and instructions
    System,
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
    /// Tool/function result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message; `null` for tool-call-only assistant turns
    #[serde(default)]
    pub content: Option<String>,
    /// Optional tool call ID (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Optional tool calls made by assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AssistantToolCall>>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

/// Tool call made by the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Type of tool call (usually "function")
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// Function details
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as JSON string
    pub arguments: String,
}

/// Request to the OpenRouter API
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to stream responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Available tools/functions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Tool definition for function calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (usually "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition for tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for function parameters
    pub parameters: Value,
}

/// Response from the OpenRouter API
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique ID for this completion
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Completion choices
    pub choices: Vec<Choice>,
    /// Usage statistics
    pub usage: Option<Usage>,
}

/// A completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Index of this choice
    #[serde(default)]
    pub index: u32,
    /// The generated message
    pub message: Message,
    /// Reason for stopping
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Streaming response chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Unique ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Delta choices
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }
}

/// A streaming choice delta
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Index of this choice
    #[serde(default)]
    pub index: u32,
    /// The delta content
    pub delta: MessageDelta,
    /// Reason for stopping
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelta {
    /// Role (only in first chunk)
    pub role: Option<Role>,
    /// Content delta
    pub content: Option<String>,
}

// ============================================================================
// Conversion
// ============================================================================

impl From<&ChatCompletionResponse> for ModelResponse {
    fn from(body: &ChatCompletionResponse) -> Self {
        let mut parts = Vec::new();
        if let Some(message) = body.choices.first().map(|c| &c.message) {
            if let Some(ref content) = message.content {
                if !content.is_empty() {
                    parts.push(ResponsePart::Text {
                        content: content.clone(),
                    });
                }
            }
            for call in message.tool_calls.iter().flatten() {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                parts.push(ResponsePart::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.function.name.clone(),
                    arguments,
                });
            }
        }

        let response = ModelResponse::new(parts);
        if body.model.is_empty() {
            response
        } else {
            response.with_model_name(body.model.clone())
        }
    }
}

/// Flatten the conversation log into OpenRouter chat messages.
///
/// A tool return whose call is not present in the preceding messages is
/// dropped: the API rejects tool messages that answer no visible call.
pub fn to_wire_messages(messages: &[ModelMessage]) -> Vec<Message> {
    let mut wire = Vec::new();
    let mut open_calls: HashSet<&str> = HashSet::new();

    for message in messages {
        match message {
            ModelMessage::Request(request) => {
                for part in &request.parts {
                    match part {
                        RequestPart::SystemPrompt { content } => wire.push(Message::system(content)),
                        RequestPart::UserPrompt { content } => wire.push(Message::user(content)),
                        RequestPart::ToolReturn {
                            tool_call_id,
                            tool_name,
                            content,
                        } => {
                            if open_calls.remove(tool_call_id.as_str()) {
                                wire.push(Message::tool(tool_call_id, content));
                            } else {
                                warn!(
                                    "Dropping tool return without matching call: tool={}, id={}",
                                    tool_name, tool_call_id
                                );
                            }
                        }
                    }
                }
            }
            ModelMessage::Response(response) => {
                let text = response.text();
                let calls: Vec<AssistantToolCall> = response
                    .tool_calls()
                    .into_iter()
                    .map(|call| {
                        open_calls.insert(call.id);
                        AssistantToolCall {
                            id: call.id.to_string(),
                            call_type: default_call_type(),
                            function: FunctionCall {
                                name: call.name.to_string(),
                                arguments: call.arguments.to_string(),
                            },
                        }
                    })
                    .collect();

                wire.push(Message {
                    role: Role::Assistant,
                    content: if text.is_empty() && !calls.is_empty() {
                        None
                    } else {
                        Some(text)
                    },
                    tool_call_id: None,
                    tool_calls: if calls.is_empty() { None } else { Some(calls) },
                });
            }
        }
    }

    wire
}
