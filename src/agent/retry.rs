//! Rate-limit aware retrying transport
//!
//! Retries individual model calls, never whole agent turns: a tool call is
//! only dispatched after the call that requested it succeeded, so a retry
//! here can never run a tool side effect twice.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::transport::{ModelTransport, RequestParameters, ResponseStream};
use super::types::{ModelMessage, ModelResponse};
use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Builds the wrapped transport from a model name on first use
pub type TransportResolver = Arc<dyn Fn(&str) -> Result<Arc<dyn ModelTransport>> + Send + Sync>;

/// Called before each backoff wait with `(attempt, delay)`
pub type RetryHook = Arc<dyn Fn(u32, Duration) + Send + Sync>;

enum Inner {
    Ready(Arc<dyn ModelTransport>),
    Lazy {
        resolver: TransportResolver,
        cell: OnceCell<Arc<dyn ModelTransport>>,
    },
}

/// Decorator that retries rate-limited requests with exponential backoff
///
/// A drop-in [`ModelTransport`]: `request` is retried on
/// [`Error::RateLimit`] up to `max_retries` times, waiting
/// `min(base_delay * 2^attempt, max_delay)` before each retry. Any other
/// error is returned untouched. `request_stream` is delegated once and never
/// retried.
///
/// Holds only configuration and the lazily resolved inner transport, so one
/// instance can be shared across concurrent turns.
pub struct RetryingTransport {
    model_name: String,
    inner: Inner,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
    on_retry: Option<RetryHook>,
}

impl RetryingTransport {
    /// Wrap an existing transport
    pub fn new(inner: Arc<dyn ModelTransport>) -> Self {
        let defaults = RetryConfig::default();
        RetryingTransport {
            model_name: inner.model_name().to_string(),
            inner: Inner::Ready(inner),
            max_retries: defaults.max_retries,
            base_delay: defaults.base_delay,
            max_delay: defaults.max_delay,
            on_retry: None,
        }
    }

    /// Wrap a transport that is built from `model_name` on the first call.
    ///
    /// Construction never touches credentials; resolver failures surface
    /// from the first `request`.
    pub fn lazy(model_name: impl Into<String>, resolver: TransportResolver) -> Self {
        let defaults = RetryConfig::default();
        RetryingTransport {
            model_name: model_name.into(),
            inner: Inner::Lazy {
                resolver,
                cell: OnceCell::new(),
            },
            max_retries: defaults.max_retries,
            base_delay: defaults.base_delay,
            max_delay: defaults.max_delay,
            on_retry: None,
        }
    }

    /// Apply a retry policy
    pub fn with_config(mut self, config: &RetryConfig) -> Self {
        self.max_retries = config.max_retries;
        self.base_delay = config.base_delay;
        self.max_delay = config.max_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Cap each wait; `None` lets the delay grow without bound
    pub fn with_max_delay(mut self, max_delay: Option<Duration>) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Register a hook invoked before each backoff wait
    pub fn with_on_retry(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    async fn transport(&self) -> Result<&Arc<dyn ModelTransport>> {
        match &self.inner {
            Inner::Ready(transport) => Ok(transport),
            Inner::Lazy { resolver, cell } => {
                cell.get_or_try_init(|| async {
                    debug!("Resolving model transport: {}", self.model_name);
                    resolver(&self.model_name)
                })
                .await
            }
        }
    }
}

impl fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("model_name", &self.model_name)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelTransport for RetryingTransport {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn request(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ModelResponse> {
        let transport = self.transport().await?;

        for attempt in 0..=self.max_retries {
            match transport.request(messages, params).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimit(reason)) => {
                    if attempt == self.max_retries {
                        warn!(
                            "Rate limit retries exhausted: model={}, attempts={}",
                            self.model_name,
                            attempt + 1
                        );
                        return Err(Error::RetriesExhausted {
                            attempts: attempt + 1,
                            last: reason,
                        });
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "Rate limited by {}, retrying in {:?} (attempt {}/{})",
                        self.model_name,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    if let Some(ref hook) = self.on_retry {
                        hook(attempt, delay);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Internal("Retry loop exited unexpectedly".to_string()))
    }

    async fn request_stream(
        &self,
        messages: &[ModelMessage],
        params: &RequestParameters,
    ) -> Result<ResponseStream> {
        self.transport().await?.request_stream(messages, params).await
    }
}
