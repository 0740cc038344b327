//! Channel configuration types

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// All channel configurations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Telegram configuration
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token
    #[serde(skip_serializing, default = "default_token")]
    pub bot_token: SecretString,
    /// Whitelisted Telegram user IDs; nobody else gets an answer
    #[serde(default)]
    pub allow_from: Vec<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            bot_token: default_token(),
            allow_from: Vec::new(),
        }
    }
}

impl TelegramConfig {
    /// Whether a user is on the whitelist
    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allow_from.contains(&user_id)
    }
}

fn default_token() -> SecretString {
    SecretString::from(String::new())
}
