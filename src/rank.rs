//! Deterministic format ordering.
//!
//! One composite key decides everything, most significant first: explicit
//! preference override, language match against the configured preferred
//! language, quality ordinal, pixel count, bitrate, and finally discovery
//! order. The discovery index makes every key unique, so sorting is
//! reproducible across runs and `pick_best` always agrees with the head
//! of a sorted list.

use std::cmp::Reverse;

use crate::media::FormatDescriptor;

/// Ranking knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RankPolicy {
    /// Audio language to favor; formats without a stated language sit
    /// between a match and a mismatch.
    pub preferred_language: Option<String>,
}

impl RankPolicy {
    /// Creates the neutral policy (discovery-quality ordering only).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preferred audio language.
    #[must_use]
    pub fn with_preferred_language(mut self, lang: &str) -> Self {
        self.preferred_language = Some(lang.to_string());
        self
    }
}

/// Composite sort key; field order is significance order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    preference: i32,
    language: i8,
    quality: i64,
    pixels: i64,
    bitrate: i64,
    discovery: Reverse<usize>,
}

/// Orders formats under a [`RankPolicy`].
#[derive(Debug, Clone, Default)]
pub struct FormatRanker {
    policy: RankPolicy,
}

impl FormatRanker {
    /// Creates a ranker for the given policy.
    #[must_use]
    pub fn new(policy: RankPolicy) -> Self {
        Self { policy }
    }

    fn language_component(&self, format: &FormatDescriptor) -> i8 {
        let Some(preferred) = &self.policy.preferred_language else {
            return 0;
        };
        match &format.language {
            Some(lang) if lang.eq_ignore_ascii_case(preferred) => 1,
            Some(_) => -1,
            None => 0,
        }
    }

    fn key(&self, format: &FormatDescriptor, discovery_index: usize) -> RankKey {
        RankKey {
            preference: format.preference.unwrap_or(0),
            language: self.language_component(format),
            quality: format.quality.map_or(i64::MIN, i64::from),
            pixels: format
                .pixels()
                .map_or(-1, |p| i64::try_from(p).unwrap_or(i64::MAX)),
            bitrate: format.bitrate.map_or(-1, i64::from),
            discovery: Reverse(discovery_index),
        }
    }

    /// Sorts best-first. Stable across runs: ties on every quality
    /// component fall back to discovery order.
    pub fn sort(&self, formats: &mut Vec<FormatDescriptor>) {
        let mut keyed: Vec<(RankKey, FormatDescriptor)> = formats
            .drain(..)
            .enumerate()
            .map(|(index, format)| (self.key(&format, index), format))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        formats.extend(keyed.into_iter().map(|(_, format)| format));
    }

    /// The maximum-ranked format, or `None` for an empty slice.
    ///
    /// Reading twice returns the same format; `pick_best` on an already
    /// sorted list returns its first element.
    #[must_use]
    pub fn pick_best<'a>(&self, formats: &'a [FormatDescriptor]) -> Option<&'a FormatDescriptor> {
        formats
            .iter()
            .enumerate()
            .max_by_key(|(index, format)| self.key(format, *index))
            .map(|(_, format)| format)
    }
}
