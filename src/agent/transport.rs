//! Model transport capability
//!
//! The narrow interface the agent needs from a language model: one
//! request-response call and one streaming call. [`OpenRouterClient`]
//! implements it against the real API and [`RetryingTransport`] decorates
//! any implementation with rate-limit retries.
//!
//! [`OpenRouterClient`]: super::client::OpenRouterClient
//! [`RetryingTransport`]: super::retry::RetryingTransport

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{ChatCompletionChunk, ModelMessage, ModelResponse, ToolDefinition};
use crate::error::Result;

/// Stream of completion chunks, consumed by the caller
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// Per-call parameters besides the messages
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl RequestParameters {
    /// Parameters offering the given tools
    pub fn with_tools(tools: Vec<ToolDefinition>) -> Self {
        RequestParameters {
            tools,
            ..Default::default()
        }
    }
}

/// A language model that can be called
///
/// Implementations report HTTP 429 as [`crate::Error::RateLimit`] and every
/// other failure as a different variant.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Identifier of the model this transport talks to
    fn model_name(&self) -> &str;

    /// Send the messages and wait for the full response
    async fn request(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ModelResponse>;

    /// Send the messages and stream the response
    async fn request_stream(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ResponseStream>;
}
