//! # Home Agent
//!
//! A personal home-server assistant on Telegram.
//!
//! ## Features
//!
//! - **OpenRouter Integration:** any chat model behind one API key, with
//!   rate-limit retries that never repeat a tool's side effects
//! - **Bounded Context:** a sliding window of complete request/response pairs
//! - **User Profiles:** preferences and notes the agent keeps up to date itself
//! - **MCP Tools:** media requests and more through Model Context Protocol servers
//! - **Telegram Native:** whitelisted users, typing indicator, long replies split

pub mod agent;
pub mod bot;
pub mod config;
pub mod database;
pub mod error;
pub mod history;
pub mod mcp;
pub mod profile;
pub mod sse;
pub mod telegram;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
