//! Integration tests for the transport layer.
//!
//! Exercises the director's handler selection and the HTTP handler's
//! retry behavior against a live mock server.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use streamcatalog::transport::{
    HttpHandler, HttpHandlerConfig, RequestDirector, RequestHandler, RequestSpec, Response,
    RetryPolicy, TransportError,
};

/// Retry policy tuned for tests: quick backoff, three attempts.
fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 2.0)
}

fn http_director(retry: RetryPolicy) -> RequestDirector {
    let handler = HttpHandler::with_config(HttpHandlerConfig {
        retry,
        ..HttpHandlerConfig::default()
    })
    .expect("client construction");
    let mut director = RequestDirector::new();
    director.register(std::sync::Arc::new(handler));
    director
}

fn url(u: &str) -> Url {
    Url::parse(u).expect("valid test url")
}

// ==================== Handler Selection Tests ====================

/// A handler bound to one custom scheme, answering with a canned body.
struct StaticHandler {
    scheme: &'static str,
    body: &'static [u8],
}

#[async_trait]
impl RequestHandler for StaticHandler {
    fn name(&self) -> &'static str {
        "static"
    }

    fn supports(&self, spec: &RequestSpec) -> bool {
        spec.url.scheme() == self.scheme
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        Ok(Response {
            status: 200,
            headers: Vec::new(),
            body: self.body.to_vec(),
            final_url: spec.url.clone(),
            handler: "static",
        })
    }
}

#[tokio::test]
async fn test_first_supporting_handler_wins() {
    let mut director = RequestDirector::new();
    director.register(std::sync::Arc::new(StaticHandler {
        scheme: "data",
        body: b"first",
    }));
    director.register(std::sync::Arc::new(StaticHandler {
        scheme: "data",
        body: b"second",
    }));

    let response = director
        .dispatch(&RequestSpec::get(url("data://anything/")))
        .await
        .expect("dispatch should succeed");

    assert_eq!(response.body, b"first", "registration order decides ties");
}

#[tokio::test]
async fn test_unsupported_scheme_is_rejected_not_defaulted() {
    let mut director = RequestDirector::new();
    director.register(std::sync::Arc::new(StaticHandler {
        scheme: "data",
        body: b"",
    }));

    let result = director
        .dispatch(&RequestSpec::get(url("ftp://example.com/file")))
        .await;

    assert!(
        matches!(result, Err(TransportError::NoHandler { .. })),
        "expected NoHandler, got: {result:?}"
    );
}

#[tokio::test]
async fn test_handler_names_reflect_registration_order() {
    let mut director = RequestDirector::new();
    director.register(std::sync::Arc::new(StaticHandler {
        scheme: "data",
        body: b"",
    }));
    director.register(std::sync::Arc::new(
        HttpHandler::new().expect("client construction"),
    ));

    assert_eq!(director.handler_names(), vec!["static", "http"]);
}

// ==================== HTTP Exchange Tests ====================

#[tokio::test]
async fn test_get_exchange_returns_body_and_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.m3u8"))
        .and(query_param("token", "abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/vnd.apple.mpegurl")
                .set_body_bytes(b"#EXTM3U\n".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let director = http_director(RetryPolicy::none());
    let spec = RequestSpec::get(url(&format!("{}/manifest.m3u8", mock_server.uri())))
        .with_query("token", "abc");
    let response = director.dispatch(&spec).await.expect("exchange succeeds");

    assert!(response.is_success());
    assert_eq!(response.body, b"#EXTM3U\n");
    // Header lookup is case-insensitive.
    assert_eq!(
        response.header("content-type"),
        Some("application/vnd.apple.mpegurl")
    );
    assert_eq!(
        response.header("CONTENT-TYPE"),
        Some("application/vnd.apple.mpegurl")
    );
}

#[tokio::test]
async fn test_final_url_reflects_http_redirect() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/moved/manifest.mpd"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<MPD/>".to_vec()))
        .mount(&mock_server)
        .await;

    let director = http_director(RetryPolicy::none());
    let response = director
        .dispatch(&RequestSpec::get(url(&format!("{}/old", mock_server.uri()))))
        .await
        .expect("exchange succeeds");

    assert!(
        response.final_url.path().ends_with("/moved/manifest.mpd"),
        "final url should be the redirect target, got {}",
        response.final_url
    );
}

// ==================== Retry Behavior Tests ====================

#[tokio::test]
async fn test_get_retries_transient_failure_then_succeeds() {
    let mock_server = MockServer::start().await;

    // First request returns 503 (transient), second returns 200.
    Mock::given(method("GET"))
        .and(path("/flaky.mpd"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<MPD/>".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let director = http_director(fast_retry());
    let response = director
        .dispatch(&RequestSpec::get(url(&format!(
            "{}/flaky.mpd",
            mock_server.uri()
        ))))
        .await
        .expect("retry should rescue the exchange");

    assert_eq!(response.body, b"<MPD/>");
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let director = http_director(fast_retry());
    let result = director
        .dispatch(
            &RequestSpec::post(url(&format!("{}/watch", mock_server.uri())))
                .with_form(&[("stream_type", "dash")]),
        )
        .await;

    assert!(
        matches!(
            result,
            Err(TransportError::HttpStatus { status: 503, .. })
        ),
        "expected the first failure untouched, got: {result:?}"
    );
    // The expect(1) on the mock verifies no second attempt was made.
}

#[tokio::test]
async fn test_permanent_status_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.m3u8"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let director = http_director(fast_retry());
    let result = director
        .dispatch(&RequestSpec::get(url(&format!(
            "{}/gone.m3u8",
            mock_server.uri()
        ))))
        .await;

    assert!(
        matches!(
            result,
            Err(TransportError::HttpStatus { status: 404, .. })
        ),
        "expected 404 surfaced without retries, got: {result:?}"
    );
}

#[tokio::test]
async fn test_attempt_limit_exhausts_on_persistent_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down.mpd"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let director = http_director(fast_retry());
    let result = director
        .dispatch(&RequestSpec::get(url(&format!(
            "{}/down.mpd",
            mock_server.uri()
        ))))
        .await;

    assert!(
        matches!(
            result,
            Err(TransportError::HttpStatus { status: 503, .. })
        ),
        "expected exhausted retries to surface the status, got: {result:?}"
    );
}
