//! Configuration types module
//!
//! Re-exports all configuration types, one file per concern.

pub mod channel;
pub mod mcp;
pub mod provider;
pub mod storage;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Provider configuration (OpenRouter)
    #[serde(default)]
    pub provider: provider::ProviderConfig,

    /// Channel configurations
    #[serde(default)]
    pub channels: channel::ChannelsConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: storage::StorageConfig,

    /// MCP tool server configuration
    #[serde(default)]
    pub mcp: mcp::McpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables and files
    ///
    /// Layering, lowest to highest precedence:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. `.env` and environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Agent-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// OpenRouter model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Number of request/response pairs kept in the model context
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Maximum model calls per turn before the tool loop is aborted
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Base system prompt; the user's profile is appended per turn
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            model: default_model(),
            history_window: default_history_window(),
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_model() -> String {
    "qwen/qwq-32b:free".to_string()
}

fn default_history_window() -> usize {
    20
}

fn default_max_iterations() -> u32 {
    10
}

fn default_system_prompt() -> String {
    crate::agent::prompts::DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
