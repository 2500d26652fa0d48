//! Request routing: one director, many handlers, first capability match wins.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{RequestHandler, RequestSpec, Response, TransportError};

/// Routes each [`RequestSpec`] to the one handler that serves it.
///
/// Handlers are consulted in registration order and the first whose
/// [`supports`](RequestHandler::supports) predicate accepts the spec
/// executes it. There is no fallback to later handlers on failure: a
/// handler owns its outcome, retries included, so behavior stays
/// reproducible. The registry is append-only and read-only once resolution
/// starts; share the director with `Arc`.
pub struct RequestDirector {
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl RequestDirector {
    /// Creates an empty director.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Registers a handler. Order matters: earlier registrations win ties.
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>) {
        debug!(handler = handler.name(), "registered transport handler");
        self.handlers.push(handler);
    }

    /// Names of all registered handlers, in consultation order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Dispatches the spec to the first handler that supports it.
    ///
    /// # Errors
    ///
    /// [`TransportError::NoHandler`] when no capability predicate matches;
    /// otherwise whatever terminal error the chosen handler surfaces.
    #[tracing::instrument(skip(self, spec), fields(method = spec.method.as_str(), url = %spec.url))]
    pub async fn dispatch(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let Some(handler) = self.handlers.iter().find(|h| h.supports(spec)) else {
            warn!(url = %spec.url, "no transport handler accepts request");
            return Err(TransportError::no_handler(&spec.url));
        };

        debug!(handler = handler.name(), "dispatching request");
        let outcome = handler.execute(spec).await;
        match &outcome {
            Ok(response) => {
                debug!(handler = handler.name(), status = response.status, "exchange complete");
            }
            Err(error) => {
                debug!(handler = handler.name(), error = %error, "exchange failed");
            }
        }
        outcome
    }
}

impl Default for RequestDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDirector")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::transport::Method;

    /// Handler accepting a single scheme, answering with a canned status.
    struct SchemeHandler {
        name: &'static str,
        scheme: &'static str,
        status: u16,
    }

    #[async_trait]
    impl RequestHandler for SchemeHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn supports(&self, spec: &RequestSpec) -> bool {
            spec.url.scheme() == self.scheme
        }

        async fn execute(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
            Ok(Response {
                status: self.status,
                headers: vec![],
                body: vec![],
                final_url: spec.url.clone(),
                handler: self.name,
            })
        }
    }

    fn spec(url: &str) -> RequestSpec {
        RequestSpec::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_dispatch_no_handler() {
        let director = RequestDirector::new();
        let err = director.dispatch(&spec("https://example.com/")).await.unwrap_err();
        assert!(matches!(err, TransportError::NoHandler { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_first_match_wins() {
        let mut director = RequestDirector::new();
        director.register(Arc::new(SchemeHandler {
            name: "first",
            scheme: "https",
            status: 200,
        }));
        director.register(Arc::new(SchemeHandler {
            name: "second",
            scheme: "https",
            status: 201,
        }));

        let response = director.dispatch(&spec("https://example.com/")).await.unwrap();
        assert_eq!(response.handler, "first");
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_dispatch_skips_non_matching_handlers() {
        let mut director = RequestDirector::new();
        director.register(Arc::new(SchemeHandler {
            name: "data",
            scheme: "data",
            status: 200,
        }));
        director.register(Arc::new(SchemeHandler {
            name: "web",
            scheme: "https",
            status: 204,
        }));

        let response = director.dispatch(&spec("https://example.com/")).await.unwrap();
        assert_eq!(response.handler, "web");
    }

    #[tokio::test]
    async fn test_dispatch_preserves_method_semantics() {
        let mut director = RequestDirector::new();
        director.register(Arc::new(SchemeHandler {
            name: "web",
            scheme: "https",
            status: 200,
        }));

        let head = RequestSpec::head(Url::parse("https://example.com/live").unwrap());
        assert_eq!(head.method, Method::Head);
        let response = director.dispatch(&head).await.unwrap();
        assert_eq!(response.handler, "web");
    }

    #[test]
    fn test_debug_lists_handler_names() {
        let mut director = RequestDirector::new();
        director.register(Arc::new(SchemeHandler {
            name: "web",
            scheme: "https",
            status: 200,
        }));
        let debug = format!("{director:?}");
        assert!(debug.contains("web"));
    }
}
