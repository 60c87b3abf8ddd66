//! Error types for image generation and download.

use std::time::Duration;

/// Maximum length of a provider error message kept in an error value.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while generating or downloading images.
#[derive(Debug, thiserror::Error)]
pub enum PicturaError {
    /// Prompt was empty after trimming whitespace.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// A generation request is already in flight.
    #[error("a generation request is already in flight")]
    Busy,

    /// The gallery was reset while the request was in flight.
    #[error("request superseded by a reset")]
    Superseded,

    /// No signed-in session is available.
    #[error("not signed in")]
    NotSignedIn,

    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Account has no remaining credits or quota.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if the response carried one.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, PicturaError>;

/// Reads a `Retry-After` header expressed in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Strips API keys from a provider message and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            if word.starts_with("sk-") {
                "[redacted]".to_string()
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}
