//! Downloadable stream variants.

use url::Url;

/// Delivery protocol of one format.
///
/// A downstream downloader picks its fetch strategy from this value alone:
/// direct formats are plain byte ranges, the others point at a manifest the
/// downloader re-reads segment by segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain progressive HTTP(S) download.
    DirectHttp,
    /// Adaptive HTTP-segment playlist (m3u8).
    Hls,
    /// XML stream description (MPD).
    Dash,
    /// Fragmented smooth-streaming index.
    Ism,
    /// Legacy flash media manifest.
    F4m,
}

impl Protocol {
    /// Short stable token, suitable for format ids and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectHttp => "https",
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Ism => "ism",
            Self::F4m => "f4m",
        }
    }

    /// Default container extension for formats of this protocol when the
    /// source does not say otherwise.
    #[must_use]
    pub fn default_ext(self) -> &'static str {
        match self {
            Self::DirectHttp | Self::Dash | Self::Hls => "mp4",
            Self::Ism => "ismv",
            Self::F4m => "flv",
        }
    }
}

/// One downloadable stream variant.
///
/// Everything a downloader needs travels on this struct: the URL, the
/// protocol to fetch it with, and any request headers the origin demands.
/// The quality fields feed the ranker; missing values rank below any
/// present value and never error.
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    /// Unique id within one media result (the catalog disambiguates
    /// collisions with a stable numeric suffix).
    pub format_id: String,
    pub url: Url,
    pub protocol: Protocol,
    /// Container extension ("mp4", "webm", ...).
    pub ext: Option<String>,
    /// Explicit ranking override set by site logic; unset counts as 0.
    pub preference: Option<i32>,
    /// Average bitrate in kbit/s.
    pub bitrate: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Ordinal from a discrete quality label when the source exposes no
    /// numbers (see `QualityLadder`).
    pub quality: Option<i32>,
    /// Audio language code as the source states it.
    pub language: Option<String>,
    /// Extra request headers required to fetch this format.
    pub headers: Vec<(String, String)>,
    pub audio_only: bool,
    pub video_only: bool,
}

impl FormatDescriptor {
    /// Creates a descriptor with all quality fields unset.
    #[must_use]
    pub fn new(format_id: impl Into<String>, url: Url, protocol: Protocol) -> Self {
        Self {
            format_id: format_id.into(),
            url,
            protocol,
            ext: None,
            preference: None,
            bitrate: None,
            width: None,
            height: None,
            quality: None,
            language: None,
            headers: Vec::new(),
            audio_only: false,
            video_only: false,
        }
    }

    /// Pixel count when both dimensions are known.
    #[must_use]
    pub fn pixels(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }
}

/// Joins the `Some` parts with `-`, skipping empties.
///
/// The conventional way format ids are assembled from a technology token
/// plus whatever quality markers the source exposes.
#[must_use]
pub fn join_format_id(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .copied()
        .filter_map(|p| p.filter(|s| !s.is_empty()))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_join_format_id_skips_missing_parts() {
        assert_eq!(
            join_format_id(&[Some("dash"), None, Some("3000")]),
            "dash-3000"
        );
        assert_eq!(join_format_id(&[Some("hls"), Some(""), Some("A")]), "hls-A");
        assert_eq!(join_format_id(&[None, None]), "");
    }

    #[test]
    fn test_pixels_requires_both_dimensions() {
        let url = Url::parse("https://example.com/v.mp4").unwrap();
        let mut format = FormatDescriptor::new("f1", url, Protocol::DirectHttp);
        assert_eq!(format.pixels(), None);
        format.width = Some(1920);
        assert_eq!(format.pixels(), None);
        format.height = Some(1080);
        assert_eq!(format.pixels(), Some(1920 * 1080));
    }

    #[test]
    fn test_protocol_tokens() {
        assert_eq!(Protocol::Hls.as_str(), "hls");
        assert_eq!(Protocol::DirectHttp.as_str(), "https");
        assert_eq!(Protocol::F4m.default_ext(), "flv");
    }
}
