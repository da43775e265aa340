//! Error types for the HTTP layer.
//!
//! Every variant carries the URL it refers to so that logs and user-facing
//! messages stay actionable without extra context from the caller.

use reqwest::Method;
use thiserror::Error;

/// Errors produced by [`RetryingHttpClient`](super::RetryingHttpClient).
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-success HTTP response.
    #[error("HTTP {status} from {method} {url}")]
    Status {
        /// Request method.
        method: Method,
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// Transport-level failure (connection refused/reset, timeout, TLS).
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// The URL that could not be reached.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt ceiling was reached; `last` is the final failure observed.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    ExhaustedRetries {
        /// The URL that kept failing.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Final error observed.
        #[source]
        last: Box<HttpError>,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl HttpError {
    /// Creates an HTTP status error.
    pub fn status(method: Method, url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            method,
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn status_with_retry_after(
        method: Method,
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::Status {
            method,
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a transport error from a reqwest error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Wraps the final failure of a request that ran out of attempts.
    pub fn exhausted(url: impl Into<String>, attempts: u32, last: HttpError) -> Self {
        Self::ExhaustedRetries {
            url: url.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status of the last response, looking through
    /// [`HttpError::ExhaustedRetries`].
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::ExhaustedRetries { last, .. } => last.status_code(),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::InvalidUrl { .. } => None,
        }
    }

    /// True when the server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
