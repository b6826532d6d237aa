//! Error types for the AI module

use std::time::Duration;

use reqwest::Response;
use reqwest::header::RETRY_AFTER;
use thiserror::Error;

/// Error bodies are capped before they reach logs or error chains.
const MAX_ERROR_BODY: usize = 512;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("generation error: {0}")]
    Generation(String),

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("empty completion from {0}")]
    EmptyCompletion(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// Build an `Api` error from a non-success response, consuming its
    /// body (truncated) and the `retry-after` header if present.
    pub(crate) async fn from_failed_response(response: Response, provider: &str) -> Self {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        Self::Api {
            provider: provider.to_string(),
            status,
            message: truncate_message(body, MAX_ERROR_BODY),
            retry_after,
        }
    }

    /// Whether a retry may succeed: rate limits, server-side failures and
    /// transport errors are retryable; client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

/// Cap `body` at `max` bytes without splitting a multibyte character.
fn truncate_message(body: String, max: usize) -> String {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &body[..end])
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
