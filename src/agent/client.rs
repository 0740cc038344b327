//! OpenRouter API client

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::transport::{ModelTransport, RequestParameters, ResponseStream};
use super::types::*;
use crate::config::OpenRouterConfig;
use crate::error::{Error, Result};
use crate::sse::SseParser;

/// OpenRouter API client bound to one model
#[derive(Clone)]
pub struct OpenRouterClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OpenRouterConfig,
    /// Model identifier, e.g. "qwen/qwq-32b:free"
    model: String,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client
    pub fn new(config: OpenRouterConfig, model: impl Into<String>) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenRouter API key is not set".to_string()));
        }

        let mut headers = header::HeaderMap::new();

        // Add authorization header
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        // Add OpenRouter-specific headers
        if let Some(ref site_url) = config.site_url {
            if let Ok(value) = header::HeaderValue::from_str(site_url) {
                headers.insert("HTTP-Referer", value);
            }
        }
        if let Some(ref site_name) = config.site_name {
            if let Ok(value) = header::HeaderValue::from_str(site_name) {
                headers.insert("X-Title", value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenRouterClient {
            client,
            config,
            model: model.into(),
        })
    }

    fn build_request(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
        stream: bool,
    ) -> ChatCompletionRequest {
        let has_tools = !params.tools.is_empty();
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: Some(stream),
            tools: has_tools.then(|| params.tools.clone()),
            tool_choice: has_tools.then(|| "auto".to_string()),
        }
    }

    /// POST to the completions endpoint and classify failures
    async fn post(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(
            "Sending request to OpenRouter: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("Rate limit exceeded: {}", error_text);
            Err(Error::RateLimit(error_text))
        } else if status.as_u16() == 401 {
            Err(Error::Unauthorized("Invalid API key".to_string()))
        } else {
            Err(Error::OpenRouter(format!("API error ({}): {}", status, error_text)))
        }
    }
}

#[async_trait]
impl ModelTransport for OpenRouterClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn request(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ModelResponse> {
        let request = self.build_request(messages, params, false);
        let body: ChatCompletionResponse = self.post(&request).await?.json().await?;

        if body.choices.is_empty() {
            return Err(Error::OpenRouter("Response contained no choices".to_string()));
        }

        if let Some(ref usage) = body.usage {
            info!("OpenRouter response: model={}, tokens={}", body.model, usage.total_tokens);
        }

        let response = ModelResponse::from(&body);
        Ok(if response.model_name.is_none() {
            response.with_model_name(self.model.clone())
        } else {
            response
        })
    }

    async fn request_stream(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ResponseStream> {
        let request = self.build_request(messages, params, true);
        let response = self.post(&request).await?;

        Ok(Box::pin(completion_chunks(response.bytes_stream())))
    }
}

/// Decode an SSE byte stream into completion chunks
///
/// Bytes are buffered until a full event arrived, so a character split
/// across network chunks is decoded intact.
fn completion_chunks<S, B, E>(bytes: S) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let mut parser = SseParser::new();
    bytes
        .map(Some)
        .chain(futures::stream::once(async { None }))
        .map(move |chunk| -> Result<Vec<ChatCompletionChunk>> {
            let events = match chunk {
                Some(data) => parser.push(data.map_err(Into::<Error>::into)?.as_ref()),
                None => parser.finish().into_iter().collect(),
            };
            events
                .iter()
                .filter_map(|event| parse_chunk(&event.data).transpose())
                .collect()
        })
        .flat_map(|parsed| {
            let items: Vec<Result<ChatCompletionChunk>> = match parsed {
                Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(items)
        })
}

/// One event's data; `None` for the `[DONE]` marker
fn parse_chunk(data: &str) -> Result<Option<ChatCompletionChunk>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(data)?))
}
