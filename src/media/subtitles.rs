//! Subtitle tracks and the language-keyed merge rule.

use std::collections::BTreeMap;

use url::Url;

/// One subtitle rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub url: Url,
    /// Caption format ("vtt", "ttml", "tt", "ismt", ...).
    pub ext: Option<String>,
    /// Human-readable track name when the source provides one.
    pub display_name: Option<String>,
}

impl SubtitleTrack {
    /// Creates a track with no extension or display name.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ext: None,
            display_name: None,
        }
    }

    /// Creates a track with a known caption format.
    #[must_use]
    pub fn with_ext(url: Url, ext: &str) -> Self {
        Self {
            url,
            ext: Some(ext.to_string()),
            display_name: None,
        }
    }
}

/// Language code → ordered tracks. BTreeMap keeps iteration deterministic.
pub type SubtitleMap = BTreeMap<String, Vec<SubtitleTrack>>;

/// Adds one track under `lang`, dropping it if a track with the same URL is
/// already present for that language.
pub fn add_subtitle_track(map: &mut SubtitleMap, lang: &str, track: SubtitleTrack) {
    let tracks = map.entry(lang.to_string()).or_default();
    if tracks.iter().any(|t| t.url == track.url) {
        return;
    }
    tracks.push(track);
}

/// Merges `incoming` into `target`: per language a set union on track URL,
/// preserving the order tracks were first seen.
pub fn merge_subtitle_map(target: &mut SubtitleMap, incoming: SubtitleMap) {
    for (lang, tracks) in incoming {
        for track in tracks {
            add_subtitle_track(target, &lang, track);
        }
    }
}
