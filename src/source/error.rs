//! Error types for source adapters.

use thiserror::Error;

use crate::http::{GateError, HttpError, RobotsError};

/// Errors raised while talking to a bibliographic source.
///
/// Enrichers never propagate these; they log and move on to the next
/// record. The retriever surfaces them to the pipeline.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Request failed after the retry policy gave up, or failed permanently.
    #[error("{source_name} request failed: {source}")]
    Http {
        /// Source that issued the request.
        source_name: &'static str,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// Response body could not be read or decoded.
    #[error("{source_name} returned an undecodable response: {message}")]
    Decode {
        /// Source that returned the payload.
        source_name: &'static str,
        /// What went wrong.
        message: String,
    },

    /// robots.txt forbids the request.
    #[error("robots.txt disallows {url}")]
    RobotsDisallowed {
        /// The forbidden URL.
        url: String,
    },

    /// robots.txt could not be checked.
    #[error(transparent)]
    Robots(#[from] RobotsError),

    /// The concurrency gate refused admission.
    #[error("{source_name} could not acquire a request permit: {source}")]
    Gate {
        /// Source waiting on the gate.
        source_name: &'static str,
        /// Gate failure.
        #[source]
        source: GateError,
    },
}

impl SourceError {
    /// Creates an HTTP error for `source_name`.
    #[must_use]
    pub fn http(source_name: &'static str, source: HttpError) -> Self {
        Self::Http {
            source_name,
            source,
        }
    }

    /// Creates a decode error for `source_name`.
    #[must_use]
    pub fn decode(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name,
            message: message.into(),
        }
    }

    /// Creates a robots disallow error.
    #[must_use]
    pub fn robots_disallowed(url: impl Into<String>) -> Self {
        Self::RobotsDisallowed { url: url.into() }
    }

    /// Creates a gate error for `source_name`.
    #[must_use]
    pub fn gate(source_name: &'static str, source: GateError) -> Self {
        Self::Gate {
            source_name,
            source,
        }
    }

    /// Returns true when the underlying HTTP failure was a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { source, .. } if source.is_not_found())
    }
}
