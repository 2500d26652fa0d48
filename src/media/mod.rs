//! The normalized media data model.
//!
//! # Architecture
//!
//! - [`FormatDescriptor`] / [`Protocol`] - one downloadable stream variant
//! - [`SubtitleTrack`] / [`SubtitleMap`] - caption tracks keyed by language
//! - [`QualityLadder`] - ordinal ranks for label-only quality sources
//! - [`MediaResult`] - what resolving one URL produces: a full entry, a
//!   transparent redirect, or a lazy playlist
//!
//! A [`MediaResult`] is built once per resolution and immutable afterwards;
//! a downstream downloader consumes descriptors without ever calling back
//! into the engine.

mod format;
mod playlist;
mod quality;
mod subtitles;

use url::Url;

pub use format::{FormatDescriptor, Protocol, join_format_id};
pub use playlist::{EntryCursor, EntrySource, LazyEntries};
pub use quality::QualityLadder;
pub use subtitles::{SubtitleMap, SubtitleTrack, add_subtitle_track, merge_subtitle_map};

/// Fully resolved media: metadata plus ranked formats and subtitles.
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Publish/airing time as a unix timestamp.
    pub timestamp: Option<i64>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    /// Ranked best-first by the time the entry leaves the extractor.
    pub formats: Vec<FormatDescriptor>,
    pub subtitles: SubtitleMap,
}

impl MediaEntry {
    /// Creates an entry with empty formats and subtitles.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            duration: None,
            timestamp: None,
            uploader: None,
            uploader_id: None,
            formats: Vec::new(),
            subtitles: SubtitleMap::new(),
        }
    }

    /// The top-ranked format, when any exist.
    #[must_use]
    pub fn best_format(&self) -> Option<&FormatDescriptor> {
        self.formats.first()
    }
}

/// A pointer at another resolvable URL, carrying metadata the final result
/// inherits for fields it does not set itself.
#[derive(Debug, Clone)]
pub struct RedirectTarget {
    pub url: Url,
    pub id: Option<String>,
    pub title: Option<String>,
}

impl RedirectTarget {
    /// Creates a bare redirect.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            id: None,
            title: None,
        }
    }

    /// Attaches inheritable metadata.
    #[must_use]
    pub fn with_metadata(url: Url, id: Option<&str>, title: Option<&str>) -> Self {
        Self {
            url,
            id: id.map(ToString::to_string),
            title: title.map(ToString::to_string),
        }
    }
}

/// An ordered collection of child results, produced lazily.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub entries: LazyEntries,
}

impl Playlist {
    /// Creates a playlist over a lazy sequence.
    #[must_use]
    pub fn new(id: impl Into<String>, entries: LazyEntries) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            entries,
        }
    }
}

/// Outcome of resolving one media source.
#[derive(Debug, Clone)]
pub enum MediaResult {
    /// A fully resolved entry.
    Media(Box<MediaEntry>),
    /// A transparent redirect to another resolvable URL.
    Redirect(RedirectTarget),
    /// A collection of children, resolved on demand.
    Playlist(Playlist),
}

impl MediaResult {
    /// Wraps an entry.
    #[must_use]
    pub fn from_entry(entry: MediaEntry) -> Self {
        Self::Media(Box::new(entry))
    }

    /// The entry, when this result is one.
    #[must_use]
    pub fn as_entry(&self) -> Option<&MediaEntry> {
        match self {
            Self::Media(entry) => Some(entry),
            _ => None,
        }
    }

    /// The playlist, when this result is one.
    #[must_use]
    pub fn as_playlist(&self) -> Option<&Playlist> {
        match self {
            Self::Playlist(playlist) => Some(playlist),
            _ => None,
        }
    }
}
