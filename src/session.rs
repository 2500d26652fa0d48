//! Provider session bootstrap.
//!
//! Portals that gate streams behind an account need a three-step handshake
//! before any watch call succeeds: fetch an anonymous app token, say hello
//! to open a device session (the cookie jar picks up the session cookie),
//! then log in. `SessionContext` owns that flow and its outcome. It is
//! created once per extractor and shared across resolutions; `initialize`
//! is the only mutation point and returns the cached outcome on every call
//! after the first.

use rand::Rng;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::transport::{RequestDirector, RequestSpec};

const DEFAULT_LANGUAGE: &str = "en";

/// Account login pair. `Debug` never prints either field.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a completed bootstrap hands back to the extractor.
#[derive(Clone, Default)]
pub struct SessionInfo {
    /// Scopes program-guide endpoints; absent for providers that do not
    /// partition their catalog.
    pub catalog_key: Option<String>,
    /// Serving region reported by the portal.
    pub region: Option<String>,
    /// Bearer token for account-scoped calls.
    pub account_token: Option<String>,
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("catalog_key", &self.catalog_key)
            .field("region", &self.region)
            .field(
                "account_token",
                &self.account_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Default)]
enum SessionState {
    #[default]
    New,
    Ready(SessionInfo),
}

// ==================== Wire Payloads ====================

#[derive(Deserialize)]
struct AppTokenEnvelope {
    session_token: String,
}

#[derive(Deserialize)]
struct HelloEnvelope {
    #[serde(default)]
    session: Option<HelloSession>,
}

#[derive(Deserialize)]
struct HelloSession {
    #[serde(default)]
    region: Option<String>,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    session: Option<AccountSession>,
}

#[derive(Deserialize)]
struct AccountSession {
    #[serde(default)]
    account_token: Option<String>,
    #[serde(default)]
    catalog_key: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// Per-extractor authentication state.
pub struct SessionContext {
    provider: String,
    api_base: Url,
    language: String,
    credentials: Option<Credentials>,
    state: Mutex<SessionState>,
}

impl SessionContext {
    /// Creates an uninitialized session for `provider` rooted at `api_base`.
    #[must_use]
    pub fn new(provider: impl Into<String>, api_base: Url, credentials: Option<Credentials>) -> Self {
        Self {
            provider: provider.into(),
            api_base,
            language: DEFAULT_LANGUAGE.to_string(),
            credentials,
            state: Mutex::new(SessionState::New),
        }
    }

    /// Sets the hello-call language.
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResolveError> {
        self.api_base.join(path).map_err(|e| {
            ResolveError::unexpected(&self.provider, &format!("bad endpoint '{path}': {e}"))
        })
    }

    /// Runs the bootstrap once; later calls return the cached outcome.
    ///
    /// # Errors
    ///
    /// [`ResolveError::LoginRequired`] without credentials,
    /// [`ResolveError::AuthenticationFailed`] when the portal rejects them,
    /// and transport errors from the handshake itself (fatal, not retried
    /// here).
    #[tracing::instrument(skip(self, director), fields(provider = %self.provider))]
    pub async fn initialize(&self, director: &RequestDirector) -> Result<SessionInfo, ResolveError> {
        let mut state = self.state.lock().await;
        if let SessionState::Ready(info) = &*state {
            return Ok(info.clone());
        }

        let Some(credentials) = &self.credentials else {
            return Err(ResolveError::login_required(
                &self.provider,
                "no credentials configured",
            ));
        };

        let info = self.bootstrap(director, credentials).await?;
        debug!(
            catalog_key = info.catalog_key.as_deref().unwrap_or("-"),
            region = info.region.as_deref().unwrap_or("-"),
            "session established"
        );
        *state = SessionState::Ready(info.clone());
        Ok(info)
    }

    async fn bootstrap(
        &self,
        director: &RequestDirector,
        credentials: &Credentials,
    ) -> Result<SessionInfo, ResolveError> {
        // 1. Anonymous app token.
        let response = director
            .dispatch(&RequestSpec::get(self.endpoint("session/app-token")?))
            .await?;
        let app_token: AppTokenEnvelope = response.json()?;

        // 2. Device hello; the session cookie lands in the shared jar.
        let uuid = client_uuid();
        let hello_spec = RequestSpec::post(self.endpoint("v3/session/hello")?).with_form(&[
            ("uuid", uuid.as_str()),
            ("lang", self.language.as_str()),
            ("app_token", app_token.session_token.as_str()),
            ("format", "json"),
        ]);
        let response = director.dispatch(&hello_spec).await?;
        let hello: HelloEnvelope = response.json()?;
        let hello_region = hello.session.and_then(|s| s.region);

        // 3. Account login. The portal answers 400 for bad credentials.
        let login_spec = RequestSpec::post(self.endpoint("v2/account/login")?).with_form(&[
            ("login", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("remember", "true"),
        ]);
        let response = match director.dispatch(&login_spec).await {
            Ok(response) => response,
            Err(error) if error.status() == Some(400) => {
                return Err(ResolveError::authentication_failed(
                    &self.provider,
                    "incorrect username and/or password",
                ));
            }
            Err(error) => return Err(error.into()),
        };
        let login: LoginEnvelope = response.json()?;
        if login.success == Some(false) {
            return Err(ResolveError::authentication_failed(
                &self.provider,
                "portal refused the login",
            ));
        }

        let account = login.session.unwrap_or(AccountSession {
            account_token: None,
            catalog_key: None,
            region: None,
        });
        Ok(SessionInfo {
            catalog_key: account.catalog_key,
            region: account.region.or(hello_region),
            account_token: account.account_token,
        })
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base.as_str())
            .field("has_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// Random per-process device id for the hello call.
fn client_uuid() -> String {
    format!("{:032x}", rand::thread_rng().gen_range(0..u128::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn api_base() -> Url {
        Url::parse("https://portal.example.com/api/").unwrap()
    }

    // ==================== Redaction Tests ====================

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::new("user@example.com", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("user@example.com"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_session_info_debug_redacts_token() {
        let info = SessionInfo {
            catalog_key: Some("cat-1".to_string()),
            region: Some("CH".to_string()),
            account_token: Some("secret-token".to_string()),
        };
        let rendered = format!("{info:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("cat-1"));
    }

    #[test]
    fn test_session_context_debug_hides_credentials() {
        let session = SessionContext::new(
            "portal",
            api_base(),
            Some(Credentials::new("u", "p")),
        );
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("password"));
        assert!(rendered.contains("has_credentials: true"));
    }

    // ==================== State Tests ====================

    #[tokio::test]
    async fn test_missing_credentials_is_login_required() {
        let session = SessionContext::new("portal", api_base(), None);
        let director = RequestDirector::new();

        let err = session.initialize(&director).await.unwrap_err();
        assert!(matches!(err, ResolveError::LoginRequired { .. }));

        // Still unauthenticated afterwards; the error repeats.
        let err = session.initialize(&director).await.unwrap_err();
        assert!(matches!(err, ResolveError::LoginRequired { .. }));
    }

    #[test]
    fn test_endpoint_joins_relative_paths() {
        let session = SessionContext::new("portal", api_base(), None);
        let url = session.endpoint("v3/session/hello").unwrap();
        assert_eq!(url.as_str(), "https://portal.example.com/api/v3/session/hello");
    }

    #[test]
    fn test_client_uuid_shape() {
        let a = client_uuid();
        let b = client_uuid();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
