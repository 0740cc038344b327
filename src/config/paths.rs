//! Configuration paths
//!
//! Utilities for resolving configuration file paths.

use std::path::PathBuf;

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HOME_AGENT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .map(|d| d.join("home-agent"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("home-agent"))
                .unwrap_or_else(|| PathBuf::from(".home-agent"))
        })
}

/// Get the main configuration file path
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("HOME_AGENT_CONFIG") {
        return PathBuf::from(path);
    }

    config_dir().join("config.json")
}

/// Ensure the parent directory of a file exists
pub fn ensure_parent_dir(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}
