//! Provider configuration types
//!
//! Configuration for the LLM provider (OpenRouter) and its retry policy.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenRouter configuration
    pub openrouter: Option<OpenRouterConfig>,
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// OpenRouter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Base URL
    #[serde(default = "default_openrouter_url")]
    pub base_url: String,
    /// Site URL for rankings
    pub site_url: Option<String>,
    /// Site name for rankings
    pub site_name: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Rate-limit retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        OpenRouterConfig {
            api_key: default_secret(),
            base_url: default_openrouter_url(),
            site_url: None,
            site_name: None,
            timeout_secs: default_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Retry policy for rate-limited (HTTP 429) model calls
///
/// The wait before retry `n` (zero-based) is `base_delay * 2^n`, capped at
/// `max_delay` when one is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first failed call
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound for a single wait; `None` lets the delay grow unbounded
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: default_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

fn default_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Option<Duration> {
    Some(Duration::from_secs(30))
}
