//! Answer service errors.

use thiserror::Error;

/// Errors from an [`AnswerService`](crate::AnswerService) call.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// HTTP request failed. The request URL is stripped on conversion.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// The call did not finish in time.
    #[error("timed out after {after_ms}ms")]
    Timeout {
        /// Deadline that expired.
        after_ms: u64,
    },

    /// The provider answered without any text.
    #[error("empty response from model")]
    EmptyResponse,

    /// Missing or rejected credentials.
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl AnswerError {
    /// Error category, used as a metrics label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Api { status: 429, .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Timeout { .. } => "timeout",
            Self::EmptyResponse => "empty",
            Self::Auth { .. } => "auth",
            Self::Other { .. } => "unknown",
        }
    }
}

impl From<reqwest::Error> for AnswerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

/// Result alias for answer service calls.
pub type AnswerResult<T> = std::result::Result<T, AnswerError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
