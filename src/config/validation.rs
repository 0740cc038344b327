//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_provider_config(config, result);
    result = validate_channel_config(config, result);
    result = validate_agent_config(config, result);
    result = validate_mcp_config(config, result);

    result
}

fn validate_provider_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    match config.provider.openrouter {
        Some(ref or) => {
            if or.api_key.expose_secret().is_empty() {
                result = result.with_error(
                    ValidationIssue::new("provider.openrouter.api_key", "OpenRouter API key is empty")
                        .with_suggestion("Set OPENROUTER_API_KEY"),
                );
            }
            if or.retry.base_delay.is_zero() {
                result = result.with_error(ValidationIssue::new(
                    "provider.openrouter.retry.base_delay",
                    "Retry base delay must be positive",
                ));
            }
            if or.retry.max_retries == 0 {
                result = result.with_warning(ValidationIssue::new(
                    "provider.openrouter.retry.max_retries",
                    "Rate-limited calls will fail without retrying",
                ));
            }
            if or.retry.max_delay.is_none() {
                result = result.with_warning(
                    ValidationIssue::new(
                        "provider.openrouter.retry.max_delay",
                        "No cap on backoff delay; waits grow without bound",
                    )
                    .with_suggestion("Set max_delay, e.g. \"30s\""),
                );
            }
        }
        None => {
            result = result.with_error(
                ValidationIssue::new(
                    "provider.openrouter",
                    "No LLM provider configured. Agent will not be able to generate responses.",
                )
                .with_suggestion("Set OPENROUTER_API_KEY environment variable or configure provider.openrouter"),
            );
        }
    }

    result
}

fn validate_channel_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    match config.channels.telegram {
        Some(ref tg) => {
            if tg.bot_token.expose_secret().is_empty() {
                result = result.with_error(
                    ValidationIssue::new("channels.telegram.bot_token", "Telegram bot token is empty")
                        .with_suggestion("Get a token from @BotFather and set TELEGRAM_BOT_TOKEN"),
                );
            }
            if tg.allow_from.is_empty() {
                result = result.with_warning(
                    ValidationIssue::new(
                        "channels.telegram.allow_from",
                        "Whitelist is empty; every user will be rejected",
                    )
                    .with_suggestion("Set ALLOWED_TELEGRAM_IDS"),
                );
            }
        }
        None => {
            result = result.with_error(
                ValidationIssue::new("channels.telegram", "Telegram is not configured")
                    .with_suggestion("Set TELEGRAM_BOT_TOKEN environment variable"),
            );
        }
    }

    result
}

fn validate_agent_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.agent.history_window == 0 {
        result = result.with_warning(ValidationIssue::new(
            "agent.history_window",
            "History window is 0; the agent only sees the current message",
        ));
    }
    if config.agent.max_iterations == 0 {
        result = result.with_error(ValidationIssue::new(
            "agent.max_iterations",
            "At least one model call per turn is required",
        ));
    }

    result
}

fn validate_mcp_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    for (i, server) in config.mcp.all_servers().iter().enumerate() {
        let path = format!("mcp.servers[{}]", i);
        match (&server.url, &server.command) {
            (_, Some(command)) if command.trim().is_empty() => {
                result = result.with_error(ValidationIssue::new(
                    path,
                    format!("Server '{}' has an empty command", server.name),
                ));
            }
            (_, Some(_)) => {}
            (Some(url), None) => {
                if let Err(e) = url::Url::parse(url) {
                    result = result.with_error(ValidationIssue::new(
                        path,
                        format!("Server '{}' has an invalid URL '{}': {}", server.name, url, e),
                    ));
                }
            }
            (None, None) => {
                result = result.with_error(
                    ValidationIssue::new(path, format!("Server '{}' has no transport", server.name))
                        .with_suggestion("Set either url or command"),
                );
            }
        }
    }

    result
}
