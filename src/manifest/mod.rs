//! Manifest parsers: one per manifest family, all pure.
//!
//! # Architecture
//!
//! - [`ManifestFamily`] - the five supported document families and how to
//!   recognize them (URL extension, content sniff)
//! - [`parse_manifest`] - dispatch to the family parser:
//!   `(bytes, base URL, id prefix) -> formats + subtitles`
//! - [`hls`] - adaptive HTTP-segment playlists (text)
//! - [`dash`], [`smil`], [`ism`], [`f4m`] - the XML families
//!
//! Parsers never perform I/O and never impose an order on their output;
//! the catalog owns ordering and failure policy. A malformed document is a
//! [`ParseError`] for the caller to record or escalate.

mod error;
mod xml;

pub mod dash;
pub mod f4m;
pub mod hls;
pub mod ism;
pub mod smil;

use url::Url;

pub use error::ParseError;

use crate::media::{FormatDescriptor, SubtitleMap};

/// The manifest document families the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestFamily {
    /// Adaptive HTTP-segment playlist (m3u8).
    Hls,
    /// XML stream description (MPD).
    Dash,
    /// Synchronized-layout XML (SMIL).
    Smil,
    /// Fragmented smooth-streaming index.
    Ism,
    /// Legacy flash media manifest.
    F4m,
}

impl ManifestFamily {
    /// Short lowercase token, used in format ids and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Smil => "smil",
            Self::Ism => "ism",
            Self::F4m => "f4m",
        }
    }

    /// Guesses the family from the URL path extension.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            Some(Self::Hls)
        } else if path.ends_with(".mpd") {
            Some(Self::Dash)
        } else if path.ends_with(".smil") {
            Some(Self::Smil)
        } else if path.contains(".ism") {
            Some(Self::Ism)
        } else if path.ends_with(".f4m") {
            Some(Self::F4m)
        } else {
            None
        }
    }

    /// Guesses the family from document content.
    ///
    /// Only the leading portion is inspected; enough for the playlist
    /// leader or the XML root element.
    #[must_use]
    pub fn sniff(body: &[u8]) -> Option<Self> {
        let head = String::from_utf8_lossy(&body[..body.len().min(1024)]);
        let head = head.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("#EXTM3U") {
            Some(Self::Hls)
        } else if head.contains("<MPD") {
            Some(Self::Dash)
        } else if head.contains("<smil") {
            Some(Self::Smil)
        } else if head.contains("<SmoothStreamingMedia") {
            Some(Self::Ism)
        } else if head.contains("ns.adobe.com/f4m") {
            Some(Self::F4m)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ManifestFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one parsed manifest contributes to a resolution.
#[derive(Debug, Clone, Default)]
pub struct ManifestOutput {
    pub formats: Vec<FormatDescriptor>,
    pub subtitles: SubtitleMap,
}

/// Parses `body` as a manifest of `family`.
///
/// `base_url` resolves relative references; `id_prefix` seeds the format
/// ids (typically the asset-type token).
///
/// # Errors
///
/// [`ParseError`] when the document is not a valid instance of the family.
pub fn parse_manifest(
    family: ManifestFamily,
    body: &[u8],
    base_url: &Url,
    id_prefix: &str,
) -> Result<ManifestOutput, ParseError> {
    match family {
        ManifestFamily::Hls => hls::parse(body, base_url, id_prefix),
        ManifestFamily::Dash => dash::parse(body, base_url, id_prefix),
        ManifestFamily::Smil => smil::parse(body, base_url, id_prefix),
        ManifestFamily::Ism => ism::parse(body, base_url, id_prefix),
        ManifestFamily::F4m => f4m::parse(body, base_url, id_prefix),
    }
}

/// Resolves a possibly relative URL against the manifest's base URL.
///
/// Absolute values pass through, protocol-relative values inherit https.
pub(crate) fn resolve_ref(value: &str, base_url: &Url) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Url::parse(value).ok();
    }
    if value.starts_with("//") {
        return Url::parse(&format!("https:{value}")).ok();
    }
    base_url.join(value).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Family Detection Tests ====================

    #[test]
    fn test_from_url_by_extension() {
        let cases = [
            ("https://cdn.example.com/live/master.m3u8", ManifestFamily::Hls),
            ("https://cdn.example.com/vod/show.mpd", ManifestFamily::Dash),
            ("https://cdn.example.com/feed/clip.smil", ManifestFamily::Smil),
            ("https://cdn.example.com/stream.ism/Manifest", ManifestFamily::Ism),
            ("https://cdn.example.com/hd.f4m", ManifestFamily::F4m),
        ];
        for (raw, family) in cases {
            let url = Url::parse(raw).unwrap();
            assert_eq!(ManifestFamily::from_url(&url), Some(family), "{raw}");
        }
    }

    #[test]
    fn test_from_url_query_ignored() {
        let url = Url::parse("https://cdn.example.com/master.m3u8?token=abc.mpd").unwrap();
        assert_eq!(ManifestFamily::from_url(&url), Some(ManifestFamily::Hls));
    }

    #[test]
    fn test_from_url_unknown_extension() {
        let url = Url::parse("https://cdn.example.com/watch/page.html").unwrap();
        assert_eq!(ManifestFamily::from_url(&url), None);
    }

    #[test]
    fn test_sniff_each_family() {
        assert_eq!(
            ManifestFamily::sniff(b"#EXTM3U\n#EXT-X-VERSION:3\n"),
            Some(ManifestFamily::Hls)
        );
        assert_eq!(
            ManifestFamily::sniff(b"<?xml version=\"1.0\"?>\n<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\">"),
            Some(ManifestFamily::Dash)
        );
        assert_eq!(
            ManifestFamily::sniff(b"<smil xmlns=\"http://www.w3.org/2005/SMIL21/Language\">"),
            Some(ManifestFamily::Smil)
        );
        assert_eq!(
            ManifestFamily::sniff(b"<?xml version=\"1.0\"?><SmoothStreamingMedia MajorVersion=\"2\">"),
            Some(ManifestFamily::Ism)
        );
        assert_eq!(
            ManifestFamily::sniff(b"<manifest xmlns=\"http://ns.adobe.com/f4m/1.0\">"),
            Some(ManifestFamily::F4m)
        );
        assert_eq!(ManifestFamily::sniff(b"<html></html>"), None);
    }

    #[test]
    fn test_sniff_skips_bom() {
        let doc = "\u{feff}#EXTM3U\n".as_bytes();
        assert_eq!(ManifestFamily::sniff(doc), Some(ManifestFamily::Hls));
    }

    // ==================== resolve_ref Tests ====================

    #[test]
    fn test_resolve_ref_variants() {
        let base = Url::parse("https://cdn.example.com/vod/master.m3u8").unwrap();
        assert_eq!(
            resolve_ref("https://other.example/x.m3u8", &base).unwrap().as_str(),
            "https://other.example/x.m3u8"
        );
        assert_eq!(
            resolve_ref("//cdn2.example.com/x.m3u8", &base).unwrap().as_str(),
            "https://cdn2.example.com/x.m3u8"
        );
        assert_eq!(
            resolve_ref("hi/index.m3u8", &base).unwrap().as_str(),
            "https://cdn.example.com/vod/hi/index.m3u8"
        );
        assert!(resolve_ref("   ", &base).is_none());
    }
}
