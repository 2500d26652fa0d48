//! Resolution-level error taxonomy.
//!
//! Errors raised while turning a media URL into a [`MediaResult`] fall into
//! two groups: component failures wrapped from the transport and manifest
//! layers, and user-actionable conditions (login, geo, paid content) that a
//! frontend should surface verbatim. Follows the What/Why/Fix pattern used
//! across the project.
//!
//! [`MediaResult`]: crate::media::MediaResult

use thiserror::Error;

use crate::manifest::ParseError;
use crate::transport::TransportError;

/// Errors that can occur while resolving a media source.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transport failure on a fetch the resolution cannot proceed without
    /// (primary metadata, session setup, or a `must_succeed` manifest).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A manifest failed to parse and no other source produced formats.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The provider requires an account and no credentials were supplied
    #[error(
        "{provider}: {message}\n  Suggestion: Supply account credentials for this provider and retry"
    )]
    LoginRequired {
        /// Provider that rejected the anonymous session
        provider: String,
        /// Human-readable requirement message
        message: String,
    },

    /// Credentials were supplied but the provider rejected them
    #[error("{provider}: {message}\n  Suggestion: Check the username and password for this account")]
    AuthenticationFailed {
        /// Provider that rejected the credentials
        provider: String,
        /// Human-readable rejection message
        message: String,
    },

    /// The content is not served in the caller's region
    #[error(
        "{provider}: this content is not available in your region{}\n  Suggestion: The provider enforces geographic restrictions on this content",
        region.as_ref().map(|r| format!(" (serving region: {r})")).unwrap_or_default()
    )]
    GeoRestricted {
        /// Provider that refused to serve the content
        provider: String,
        /// Serving region reported by the provider, when known
        region: Option<String>,
    },

    /// Every asset type was exhausted without producing a single format
    #[error(
        "no downloadable formats found for '{media_id}'\n  Suggestion: The source may be offline or served through an unsupported delivery technology"
    )]
    NoFormatsFound {
        /// Identifier of the media that yielded no formats
        media_id: String,
    },

    /// The content exists but sits behind a payment or subscription wall
    #[error("{media_id}: {message}\n  Suggestion: This content requires a paid subscription")]
    PaidContent {
        /// Identifier of the paid media
        media_id: String,
        /// Human-readable payment requirement
        message: String,
    },

    /// No registered extractor accepts the URL
    #[error(
        "no extractor accepts '{url}'\n  Suggestion: Check the URL or register an extractor for this site"
    )]
    UnsupportedUrl {
        /// The URL nothing matched
        url: String,
    },

    /// The transparent-redirect chain exceeded the follow limit
    #[error(
        "too many redirects ({count}) resolving '{url}'\n  Suggestion: Check for circular redirects between providers"
    )]
    TooManyRedirects {
        /// The originally requested URL
        url: String,
        /// Number of redirects followed
        count: usize,
    },

    /// A provider payload violated its own contract (bad JSON shape,
    /// missing mandatory fields)
    #[error("{provider} returned an unexpected payload: {detail}")]
    Unexpected {
        /// Provider whose response could not be interpreted
        provider: String,
        /// What was wrong with the payload
        detail: String,
    },
}

impl ResolveError {
    /// Creates a `LoginRequired` error.
    #[must_use]
    pub fn login_required(provider: &str, message: &str) -> Self {
        Self::LoginRequired {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates an `AuthenticationFailed` error.
    #[must_use]
    pub fn authentication_failed(provider: &str, message: &str) -> Self {
        Self::AuthenticationFailed {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates a `GeoRestricted` error.
    #[must_use]
    pub fn geo_restricted(provider: &str, region: Option<&str>) -> Self {
        Self::GeoRestricted {
            provider: provider.to_string(),
            region: region.map(ToString::to_string),
        }
    }

    /// Creates a `NoFormatsFound` error.
    #[must_use]
    pub fn no_formats(media_id: &str) -> Self {
        Self::NoFormatsFound {
            media_id: media_id.to_string(),
        }
    }

    /// Creates a `PaidContent` error.
    #[must_use]
    pub fn paid_content(media_id: &str, message: &str) -> Self {
        Self::PaidContent {
            media_id: media_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates an `UnsupportedUrl` error.
    #[must_use]
    pub fn unsupported_url(url: &str) -> Self {
        Self::UnsupportedUrl {
            url: url.to_string(),
        }
    }

    /// Creates a `TooManyRedirects` error.
    #[must_use]
    pub fn too_many_redirects(url: &str, count: usize) -> Self {
        Self::TooManyRedirects {
            url: url.to_string(),
            count,
        }
    }

    /// Creates an `Unexpected` payload error.
    #[must_use]
    pub fn unexpected(provider: &str, detail: &str) -> Self {
        Self::Unexpected {
            provider: provider.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Returns true for errors the user can act on directly (credentials,
    /// region, payment) as opposed to infrastructure failures.
    #[must_use]
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Self::LoginRequired { .. }
                | Self::AuthenticationFailed { .. }
                | Self::GeoRestricted { .. }
                | Self::PaidContent { .. }
        )
    }
}
