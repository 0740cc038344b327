//! Error types for Home Agent

use thiserror::Error;

/// Result type alias using Home Agent's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Home Agent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// OpenRouter API error (any non-429 failure reported by the API)
    #[error("OpenRouter API error: {0}")]
    OpenRouter(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Telegram bot error
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// MCP server error
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Agent loop error
    #[error("Agent error: {0}")]
    Agent(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// The retry budget for rate-limited model calls was spent
    #[error("Rate limit retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total number of calls made, including the first one
        attempts: u32,
        /// Message of the last rate-limit failure
        last: String,
    },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimit(_))
    }

    /// Check if the retry budget was spent
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Error::RetriesExhausted { .. })
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::Telegram(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(Error::RateLimit("slow down".into()).is_retryable());
        assert!(!Error::OpenRouter("500".into()).is_retryable());
        assert!(!Error::RetriesExhausted { attempts: 4, last: "429".into() }.is_retryable());
    }

    #[test]
    fn test_retries_exhausted_is_distinct() {
        let err = Error::RetriesExhausted { attempts: 4, last: "too many".into() };
        assert!(err.is_retries_exhausted());
        assert!(!Error::RateLimit("x".into()).is_retries_exhausted());
        assert_eq!(
            err.to_string(),
            "Rate limit retries exhausted after 4 attempts: too many"
        );
    }
}
