//! Storage configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite configuration
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// SQLite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
    /// Enable WAL mode
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Busy timeout in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: default_sqlite_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data").join("home_agent.db")
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_max_connections() -> u32 {
    5
}
