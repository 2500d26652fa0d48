//! Streamcatalog
//!
//! This library resolves media-portal URLs into ranked, downloadable
//! format catalogs. Given a program, live-channel, or series URL it
//! drives the portal's session handshake, walks every advertised
//! streaming manifest, and returns media entries whose formats are
//! ordered best-first.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transport`] - Request dispatch over pluggable protocol handlers
//! - [`manifest`] - Streaming manifest parsers (HLS, DASH, SMIL, ISM, F4M)
//! - [`catalog`] - Format aggregation with deduplication and failure escalation
//! - [`rank`] - Composite format ordering
//! - [`media`] - Resolved media model and lazy playlists
//! - [`session`] - Portal authentication state
//! - [`extractor`] - URL routing and the portal extractor family

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod error;
pub mod extractor;
pub mod manifest;
pub mod media;
pub mod rank;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use catalog::{AssetSource, FormatCatalog, ManifestLocation};
pub use error::ResolveError;
pub use extractor::platform::{PlatformExtractor, ProviderConfig, StreamTechnology};
pub use extractor::{ExtractorRegistry, MAX_REDIRECTS, SiteExtractor};
pub use manifest::{ManifestFamily, ManifestOutput, ParseError, parse_manifest};
pub use media::{
    FormatDescriptor, LazyEntries, MediaEntry, MediaResult, Playlist, Protocol, QualityLadder,
    RedirectTarget, SubtitleMap, SubtitleTrack,
};
pub use rank::{FormatRanker, RankPolicy};
pub use session::{Credentials, SessionContext, SessionInfo};
pub use transport::{
    HttpHandler, HttpHandlerConfig, Method, RequestDirector, RequestHandler, RequestSpec, Response,
    TransportError,
};
