//! Agent module - LLM logic, prompt engineering, and OpenRouter client
//!
//! This module handles all AI-related functionality including:
//! - The structured message model and its OpenRouter wire form
//! - The sliding history window fed to every model call
//! - OpenRouter API client and the rate-limit retry wrapper around it
//! - Prompt templates with the per-user profile fragment
//! - Tool/function calling support and the profile tools
//! - The turn loop tying it together

mod client;
pub mod history;
pub mod profile_tools;
pub mod prompts;
mod retry;
mod runner;
mod tools;
mod transport;
mod types;

pub use client::OpenRouterClient;
pub use history::window;
pub use profile_tools::register_profile_tools;
pub use prompts::{PromptTemplate, SystemPrompt, DEFAULT_SYSTEM_PROMPT};
pub use retry::{RetryHook, RetryingTransport, TransportResolver};
pub use runner::{Agent, TurnOutput};
pub use tools::{
    parameters_for, parse_arguments, Tool, ToolCall, ToolRegistry, ToolResult, TurnContext,
};
pub use transport::{ModelTransport, RequestParameters, ResponseStream};
pub use types::*;
