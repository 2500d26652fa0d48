//! Error types for the transport layer.
//!
//! Structured errors for request dispatch and execution, following the
//! What/Why/Fix pattern used across the project.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while dispatching or executing a request.
///
/// Note: We intentionally do NOT implement `From<reqwest::Error>` because
/// every conversion needs the request URL for context. Use the helper
/// constructors instead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No registered handler's capability predicate accepted the request
    #[error(
        "no transport handler accepts '{url}' (scheme '{scheme}')\n  Suggestion: Register a handler for this scheme before dispatching"
    )]
    NoHandler {
        /// The URL no handler accepted
        url: String,
        /// The scheme that went unmatched
        scheme: String,
    },

    /// Network-level failure (DNS, connect, TLS, mid-body disconnect)
    #[error(
        "network request to '{url}' failed: {source}\n  Suggestion: Check your internet connection and retry"
    )]
    Network {
        /// The URL that failed
        url: String,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout
    #[error("request to '{url}' timed out\n  Suggestion: Retry, or raise the handler timeout")]
    Timeout {
        /// The URL that timed out
        url: String,
    },

    /// Terminal non-success HTTP status after the handler's retry policy
    /// was exhausted
    #[error("server returned HTTP {status} for '{url}'")]
    HttpStatus {
        /// The URL that was requested
        url: String,
        /// The HTTP status code received
        status: u16,
        /// Parsed Retry-After delay, when the server sent one
        retry_after: Option<Duration>,
    },

    /// The response body could not be decoded as the expected JSON shape
    #[error("response from '{url}' is not the expected JSON: {source}")]
    Decode {
        /// The URL whose body failed to decode
        url: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The request spec itself cannot be executed (client construction
    /// failure, malformed header value)
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request could not be built
        reason: String,
    },
}

impl TransportError {
    /// Creates a `NoHandler` error from the unmatched URL.
    #[must_use]
    pub fn no_handler(url: &url::Url) -> Self {
        Self::NoHandler {
            url: url.to_string(),
            scheme: url.scheme().to_string(),
        }
    }

    /// Creates a `Network` error with URL context.
    #[must_use]
    pub fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(url: &str) -> Self {
        Self::Timeout {
            url: url.to_string(),
        }
    }

    /// Creates an `HttpStatus` error without a Retry-After hint.
    #[must_use]
    pub fn http_status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
            retry_after: None,
        }
    }

    /// Creates an `HttpStatus` error carrying the server's Retry-After delay.
    #[must_use]
    pub fn http_status_with_retry_after(
        url: &str,
        status: u16,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
            retry_after,
        }
    }

    /// Creates a `Decode` error with URL context.
    #[must_use]
    pub fn decode(url: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.to_string(),
            source,
        }
    }

    /// Creates an `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(reason: &str) -> Self {
        Self::InvalidRequest {
            reason: reason.to_string(),
        }
    }

    /// Returns the HTTP status code when this error is a terminal status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
