//! Configuration module
//!
//! Configuration is split into focused modules:
//! - types/mod.rs: Core configuration types (Config, AgentConfig, LoggingConfig)
//! - types/provider.rs: LLM provider and retry policy
//! - types/channel.rs: Telegram configuration
//! - types/storage.rs: SQLite configuration
//! - types/mcp.rs: MCP tool servers
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths
//!
//! There is no global settings object: the binary loads a [`Config`] once
//! and hands the relevant sections to each component's constructor.

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{AgentConfig, Config, LoggingConfig};

// Re-export section types
pub use types::channel::{ChannelsConfig, TelegramConfig};
pub use types::mcp::{McpConfig, McpServerConfig};
pub use types::provider::{OpenRouterConfig, ProviderConfig, RetryConfig};
pub use types::storage::{SqliteConfig, StorageConfig};

// Re-export IO and utilities
pub use io::{apply_env_overrides, apply_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path, ensure_parent_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
