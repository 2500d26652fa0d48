//! HTTP(S) transport handler backed by a shared reqwest client.
//!
//! One client per handler: timeouts, gzip, user agent, and the optional
//! cookie store are fixed at construction. The handler retries idempotent
//! requests on transient failures per its [`RetryPolicy`] and surfaces a
//! single terminal outcome, so the director never sees intermediate
//! attempts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, warn};

use super::retry::{FailureKind, RetryDecision, RetryPolicy, classify_transport, parse_retry_after};
use super::{Method, RequestBody, RequestHandler, RequestSpec, Response, TransportError};

/// User agent sent when the config does not override it.
pub const DEFAULT_USER_AGENT: &str = "streamcatalog/0.1";

/// Default connect timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout (30 seconds; manifests are small).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction-time settings for [`HttpHandler`].
#[derive(Debug, Clone)]
pub struct HttpHandlerConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Shared cookie store; the session layer owns it.
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for HttpHandlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            cookie_jar: None,
        }
    }
}

/// The shipped `http`/`https` handler.
pub struct HttpHandler {
    client: Client,
    retry: RetryPolicy,
}

impl HttpHandler {
    /// Creates a handler with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the underlying client
    /// cannot be constructed.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(HttpHandlerConfig::default())
    }

    /// Creates a handler sharing the given cookie store, otherwise default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the underlying client
    /// cannot be constructed.
    pub fn with_cookie_jar(jar: Arc<Jar>) -> Result<Self, TransportError> {
        Self::with_config(HttpHandlerConfig {
            cookie_jar: Some(jar),
            ..HttpHandlerConfig::default()
        })
    }

    /// Creates a handler from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the underlying client
    /// cannot be constructed.
    pub fn with_config(config: HttpHandlerConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .gzip(true);

        if let Some(jar) = config.cookie_jar {
            builder = builder.cookie_provider(jar);
        }

        let client = builder.build().map_err(|e| {
            TransportError::invalid_request(&format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    /// Performs one attempt, mapping every failure into [`TransportError`].
    async fn attempt(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let method = match spec.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut request = self.client.request(method, spec.url.clone());
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        request = match &spec.body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(fields)) => request.form(fields),
            Some(RequestBody::Raw(bytes)) => request.body(bytes.clone()),
            None => request,
        };

        let url = spec.url.as_str();
        let reply = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(url)
            } else {
                TransportError::network(url, e)
            }
        })?;

        let status = reply.status().as_u16();
        let final_url = reply.url().clone();
        let headers: Vec<(String, String)> = reply
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        if !reply.status().is_success() {
            let retry_after = headers
                .iter()
                .find(|(n, _)| n == "retry-after")
                .and_then(|(_, v)| parse_retry_after(v));
            return Err(TransportError::http_status_with_retry_after(
                url,
                status,
                retry_after,
            ));
        }

        let body = reply
            .bytes()
            .await
            .map_err(|e| TransportError::network(url, e))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
            final_url,
            handler: "http",
        })
    }
}

impl std::fmt::Debug for HttpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandler")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestHandler for HttpHandler {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, spec: &RequestSpec) -> bool {
        matches!(spec.url.scheme(), "http" | "https")
    }

    #[tracing::instrument(skip(self, spec), fields(handler = "http", url = %spec.url))]
    async fn execute(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let mut attempt: u32 = 1;
        loop {
            let error = match self.attempt(spec).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            // Non-idempotent requests surface their first failure untouched.
            if !spec.method.is_idempotent() {
                return Err(error);
            }

            let kind = classify_transport(&error);
            let retry_after = match &error {
                TransportError::HttpStatus { retry_after, .. } => *retry_after,
                _ => None,
            };

            match self.retry.should_retry(kind, attempt, retry_after) {
                RetryDecision::Retry { delay, attempt: next } => {
                    debug!(
                        attempt,
                        next_attempt = next,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        transient = matches!(kind, FailureKind::Transient),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::GiveUp { reason } => {
                    if attempt > 1 {
                        warn!(attempt, %reason, error = %error, "request failed after retries");
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn test_supports_http_and_https_only() {
        let handler = HttpHandler::new().unwrap();
        let https = RequestSpec::get(Url::parse("https://example.com/").unwrap());
        let http = RequestSpec::get(Url::parse("http://example.com/").unwrap());
        let ftp = RequestSpec::get(Url::parse("ftp://example.com/").unwrap());
        assert!(handler.supports(&https));
        assert!(handler.supports(&http));
        assert!(!handler.supports(&ftp));
    }

    #[test]
    fn test_config_defaults() {
        let config = HttpHandlerConfig::default();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.cookie_jar.is_none());
        assert_eq!(config.retry.max_attempts(), super::super::DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_debug_hides_client() {
        let handler = HttpHandler::new().unwrap();
        let debug = format!("{handler:?}");
        assert!(debug.contains("HttpHandler"));
        assert!(!debug.contains("Client"));
    }
}
