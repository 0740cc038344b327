//! Tool/function calling support

use async_trait::async_trait;
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::types::{FunctionDefinition, ToolDefinition};
use crate::error::{Error, Result};
use crate::profile::{ProfileManager, UserProfile};

/// Per-turn state handed to every tool call
///
/// `profile` is the current value of the user's profile. A tool that
/// changes the profile saves the new value and stores the saved copy back
/// here, so later tools in the same turn and the caller see it.
pub struct TurnContext {
    pub user_id: i64,
    pub profile: UserProfile,
    pub profiles: ProfileManager,
}

impl TurnContext {
    pub fn new(profile: UserProfile, profiles: ProfileManager) -> Self {
        TurnContext {
            user_id: profile.user_id,
            profile,
            profiles,
        }
    }

    /// Persist `updated` and make the saved value current
    pub async fn replace_profile(&mut self, updated: UserProfile) -> Result<()> {
        self.profile = self.profiles.save(&updated).await?;
        Ok(())
    }
}

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the JSON Schema for tool parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given arguments
    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult>;

    /// Convert to OpenRouter tool definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

/// JSON Schema of `T` with all subschemas inlined
pub fn parameters_for<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let mut schema = serde_json::to_value(generator.into_root_schema_for::<T>())
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(map) = schema.as_object_mut() {
        map.remove("title");
    }
    schema
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Result content (for successful execution)
    pub content: Option<String>,
    /// Error message (for failed execution)
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            success: true,
            content: Some(content.into()),
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.success {
            write!(f, "{}", self.content.as_deref().unwrap_or_default())
        } else {
            write!(f, "Error: {}", self.error.as_deref().unwrap_or_default())
        }
    }
}

/// A tool call request from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool call ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments as JSON
    pub arguments: Value,
}

impl ToolCall {
    /// Parse arguments into a specific type
    pub fn parse_arguments<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        parse_arguments(&self.arguments)
    }
}

/// Deserialize tool arguments, reporting bad input as [`Error::InvalidInput`]
pub fn parse_arguments<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| Error::InvalidInput(format!("Invalid tool arguments: {}", e)))
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool; a later tool with the same name replaces it
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    /// Execute a tool call
    pub async fn execute(&self, ctx: &mut TurnContext, call: &ToolCall) -> Result<ToolResult> {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(ctx, call.arguments.clone()).await,
            None => Ok(ToolResult::failure(format!("Unknown tool: {}", call.name))),
        }
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// List tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
