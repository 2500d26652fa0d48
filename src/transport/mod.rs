//! Pluggable network transport: request/response model, handler seam, and
//! dispatch.
//!
//! # Architecture
//!
//! - [`RequestSpec`] / [`Response`] - the uniform exchange model every
//!   caller sees, independent of the backend that serves it
//! - [`RequestHandler`] - one backend (scheme + feature set) executing a
//!   single exchange; may retry internally but surfaces one terminal outcome
//! - [`RequestDirector`] - routes each spec to the first handler whose
//!   capability predicate accepts it; no silent handler-to-handler fallback
//! - [`HttpHandler`] - the shipped reqwest-backed handler with retry
//!
//! Handlers never touch session state; cookie stores are injected at
//! construction and belong to the session layer.

mod director;
mod error;
mod http;
mod retry;

use std::borrow::Cow;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

pub use director::RequestDirector;
pub use error::TransportError;
pub use http::{DEFAULT_USER_AGENT, HttpHandler, HttpHandlerConfig};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureKind, RetryDecision, RetryPolicy, classify_status,
    classify_transport, parse_retry_after,
};

/// HTTP method subset the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
}

impl Method {
    /// Uppercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    /// True for methods a handler may safely retry.
    #[must_use]
    pub fn is_idempotent(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

/// Request body payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON-encoded value (`Content-Type: application/json`).
    Json(serde_json::Value),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Raw bytes, content type left to the caller's headers.
    Raw(Vec<u8>),
}

/// One request as seen by the director and every handler.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    /// Extra headers, applied in order.
    pub headers: Vec<(String, String)>,
    /// Query pairs appended to the URL at execution time.
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestSpec {
    fn with_method(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request spec.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::with_method(Method::Get, url)
    }

    /// Creates a HEAD-only request spec; dispatch semantics are identical
    /// to every other spec.
    #[must_use]
    pub fn head(url: Url) -> Self {
        Self::with_method(Method::Head, url)
    }

    /// Creates a POST request spec.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::with_method(Method::Post, url)
    }

    /// Creates a PUT-only request spec; dispatch semantics are identical
    /// to every other spec.
    #[must_use]
    pub fn put(url: Url) -> Self {
        Self::with_method(Method::Put, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds headers in bulk (per-format request headers travel this way).
    #[must_use]
    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend(headers.iter().cloned());
        self
    }

    /// Adds a query pair.
    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    /// Sets a URL-encoded form body.
    #[must_use]
    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self
    }
}

/// One completed exchange.
#[derive(Debug)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as received (names lowercased).
    pub headers: Vec<(String, String)>,
    /// Full response body.
    pub body: Vec<u8>,
    /// URL after any redirects the handler followed.
    pub final_url: Url,
    /// Name of the handler that served the exchange.
    pub handler: &'static str,
}

impl Response {
    /// True when the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Body as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Decodes the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the body is not the expected
    /// shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TransportError::decode(self.final_url.as_str(), e))
    }
}

/// One transport backend.
///
/// `supports` is the capability predicate the director consults; `execute`
/// performs exactly one logical exchange (internal retries allowed) and
/// must not mutate anything beyond its own connection state.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Short stable name, reported on every [`Response`].
    fn name(&self) -> &'static str;

    /// Whether this handler can serve the spec (scheme, feature needs).
    fn supports(&self, spec: &RequestSpec) -> bool;

    /// Executes the exchange, surfacing a single terminal outcome.
    async fn execute(&self, spec: &RequestSpec) -> Result<Response, TransportError>;
}
