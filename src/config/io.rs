//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;
use std::time::Duration;

use super::types::channel::TelegramConfig;
use super::types::provider::OpenRouterConfig;
use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set variables. Env vars have the
/// highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    dotenvy::dotenv().ok();
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary variable lookup
///
/// A variable that is set but malformed is an error naming the variable;
/// it never falls back to the previous value.
pub fn apply_overrides<F>(config: &mut Config, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    use secrecy::SecretString;

    // OpenRouter overrides
    if let Some(api_key) = var("OPENROUTER_API_KEY") {
        let or = config
            .provider
            .openrouter
            .get_or_insert_with(OpenRouterConfig::default);
        or.api_key = SecretString::from(api_key);
    }
    if let Some(url) = var("OPENROUTER_BASE_URL") {
        if let Some(ref mut or) = config.provider.openrouter {
            or.base_url = url;
        }
    }
    if let Some(raw) = var("LLM_MAX_RETRIES") {
        let retries = parse_number("LLM_MAX_RETRIES", &raw)?;
        if let Some(ref mut or) = config.provider.openrouter {
            or.retry.max_retries = retries;
        }
    }
    if let Some(raw) = var("LLM_BASE_DELAY") {
        let delay = parse_delay("LLM_BASE_DELAY", &raw)?;
        if let Some(ref mut or) = config.provider.openrouter {
            or.retry.base_delay = delay;
        }
    }
    if let Some(raw) = var("LLM_MAX_DELAY") {
        let delay = if raw.trim().eq_ignore_ascii_case("none") {
            None
        } else {
            Some(parse_delay("LLM_MAX_DELAY", &raw)?)
        };
        if let Some(ref mut or) = config.provider.openrouter {
            or.retry.max_delay = delay;
        }
    }

    // Agent overrides
    if let Some(model) = var("LLM_MODEL") {
        // Accept the provider-prefixed form, e.g. "openrouter:qwen/qwq-32b:free"
        config.agent.model = model
            .strip_prefix("openrouter:")
            .map(str::to_string)
            .unwrap_or(model);
    }
    if let Some(raw) = var("HISTORY_WINDOW") {
        config.agent.history_window = parse_number("HISTORY_WINDOW", &raw)?;
    }

    // Telegram overrides
    if let Some(bot_token) = var("TELEGRAM_BOT_TOKEN") {
        let tg = config
            .channels
            .telegram
            .get_or_insert_with(TelegramConfig::default);
        tg.bot_token = SecretString::from(bot_token);
    }
    if let Some((key, raw)) = var("ALLOWED_TELEGRAM_IDS")
        .map(|v| ("ALLOWED_TELEGRAM_IDS", v))
        .or_else(|| var("TELEGRAM_ALLOWED_USERS").map(|v| ("TELEGRAM_ALLOWED_USERS", v)))
    {
        let allow_from = parse_id_list(key, &raw)?;
        let tg = config
            .channels
            .telegram
            .get_or_insert_with(TelegramConfig::default);
        tg.allow_from = allow_from;
    }

    // Storage overrides
    if let Some(path) = var("DB_PATH") {
        config.storage.sqlite.path = std::path::PathBuf::from(path);
    }

    // MCP overrides
    if let Some(host) = var("MCP_HOST") {
        config.mcp.host = host;
    }
    if let Some(raw) = var("MCP_PORT") {
        config.mcp.port = parse_number("MCP_PORT", &raw)?;
    }

    // Logging overrides
    if let Some(level) = var("LOG_LEVEL") {
        config.logging.level = level.to_lowercase();
    }
    if let Some(format) = var("LOG_FORMAT") {
        config.logging.json = format.eq_ignore_ascii_case("json");
    }

    Ok(())
}

fn invalid(key: &str, raw: &str, expected: &str) -> Error {
    Error::Config(format!("Invalid {}={:?}: expected {}", key, raw, expected))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, raw, "a non-negative integer"))
}

fn parse_delay(key: &str, raw: &str) -> Result<Duration> {
    parse_duration(raw).ok_or_else(|| invalid(key, raw, "seconds or a duration such as 500ms"))
}

/// Parse a whitelist given as `123,456` or `[123, 456]`
fn parse_id_list(key: &str, raw: &str) -> Result<Vec<i64>> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| invalid(key, raw, "a comma separated list of user ids"))
        })
        .collect()
}

/// Parse `"1.5"` (seconds) or a humantime string such as `"500ms"`
fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    humantime_serde::re::humantime::parse_duration(raw).ok()
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn overrides(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        apply_overrides(&mut config, |key| vars.get(key).cloned()).unwrap();
        config
    }

    fn override_error(pairs: &[(&str, &str)]) -> String {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        match apply_overrides(&mut config, |key| vars.get(key).cloned()) {
            Err(Error::Config(message)) => message,
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_config.json");

        let mut config = Config::default();
        config.agent.history_window = 7;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.agent.model, config.agent.model);
        assert_eq!(loaded.agent.history_window, 7);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        save_config(&Config::default(), &path).unwrap();
        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.mcp.port, 5056);
    }

    #[test]
    fn test_env_overrides_required_values() {
        let config = overrides(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("ALLOWED_TELEGRAM_IDS", "[111, 222]"),
        ]);

        let tg = config.channels.telegram.unwrap();
        assert_eq!(tg.bot_token.expose_secret(), "123:abc");
        assert_eq!(tg.allow_from, vec![111, 222]);
        let or = config.provider.openrouter.unwrap();
        assert_eq!(or.api_key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_env_overrides_defaults_untouched() {
        let config = overrides(&[]);
        assert!(config.channels.telegram.is_none());
        assert_eq!(config.storage.sqlite.path, std::path::PathBuf::from("data/home_agent.db"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let config = overrides(&[("LLM_MODEL", "openrouter:meta/llama-3:free")]);
        assert_eq!(config.agent.model, "meta/llama-3:free");
    }

    #[test]
    fn test_retry_overrides() {
        let config = overrides(&[
            ("OPENROUTER_API_KEY", "k"),
            ("LLM_MAX_RETRIES", "5"),
            ("LLM_BASE_DELAY", "250ms"),
            ("LLM_MAX_DELAY", "none"),
        ]);
        let retry = config.provider.openrouter.unwrap().retry;
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, None);
    }

    #[test]
    fn test_misc_overrides() {
        let config = overrides(&[
            ("DB_PATH", "/tmp/agent.db"),
            ("MCP_HOST", "jellyseerr-mcp"),
            ("MCP_PORT", "7000"),
            ("LOG_LEVEL", "DEBUG"),
            ("HISTORY_WINDOW", "4"),
        ]);
        assert_eq!(config.storage.sqlite.path, std::path::PathBuf::from("/tmp/agent.db"));
        assert_eq!(config.mcp.host, "jellyseerr-mcp");
        assert_eq!(config.mcp.port, 7000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.agent.history_window, 4);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("-1"), None);
        assert_eq!(parse_duration("NaN"), None);
        assert_eq!(parse_duration("1e30"), None);
    }

    #[test]
    fn test_overflowing_delay_is_rejected() {
        let message = override_error(&[("OPENROUTER_API_KEY", "k"), ("LLM_BASE_DELAY", "1e30")]);
        assert!(message.contains("LLM_BASE_DELAY"));

        let message = override_error(&[("OPENROUTER_API_KEY", "k"), ("LLM_MAX_DELAY", "1e30")]);
        assert!(message.contains("LLM_MAX_DELAY"));
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        assert!(override_error(&[("HISTORY_WINDOW", "twenty")]).contains("HISTORY_WINDOW"));
        assert!(override_error(&[("HISTORY_WINDOW", "-3")]).contains("HISTORY_WINDOW"));
        assert!(override_error(&[("LLM_MAX_RETRIES", "lots")]).contains("LLM_MAX_RETRIES"));
        assert!(override_error(&[("MCP_PORT", "99999")]).contains("MCP_PORT"));
        assert!(override_error(&[("LLM_BASE_DELAY", "soon")]).contains("LLM_BASE_DELAY"));
    }

    #[test]
    fn test_malformed_whitelist_is_rejected() {
        let message = override_error(&[("ALLOWED_TELEGRAM_IDS", "123;456")]);
        assert!(message.contains("ALLOWED_TELEGRAM_IDS"));

        let message = override_error(&[("TELEGRAM_ALLOWED_USERS", "[1, two]")]);
        assert!(message.contains("TELEGRAM_ALLOWED_USERS"));
    }

    #[test]
    fn test_whitelist_forms() {
        let config = overrides(&[("ALLOWED_TELEGRAM_IDS", "111,222")]);
        assert_eq!(config.channels.telegram.unwrap().allow_from, vec![111, 222]);

        let config = overrides(&[("ALLOWED_TELEGRAM_IDS", "[]")]);
        assert!(config.channels.telegram.unwrap().allow_from.is_empty());
    }
}
