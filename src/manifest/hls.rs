//! Adaptive HTTP-segment playlist parser (m3u8).
//!
//! Handles master playlists (variant streams, alternate audio renditions,
//! subtitle renditions) and degrades gracefully when handed a media
//! playlist: that yields a single format pointing at the playlist itself.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{ManifestFamily, ManifestOutput, ParseError, resolve_ref};
use crate::media::{
    FormatDescriptor, Protocol, SubtitleTrack, add_subtitle_track, join_format_id,
};

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// `KEY=value` pairs inside playlist tag attribute lists; values may be
/// quoted (commas allowed inside quotes).
static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"([A-Z0-9-]+)=("[^"]*"|[^",]+)"#));

/// Codec prefixes that indicate a video track inside a CODECS list.
const VIDEO_CODEC_PREFIXES: &[&str] = &[
    "avc1", "avc3", "hvc1", "hev1", "vp08", "vp09", "vp8", "vp9", "av01", "mp4v", "theora",
];

/// One alternate rendition declared by `#EXT-X-MEDIA`.
struct Rendition {
    uri: Option<String>,
    group_id: Option<String>,
    language: Option<String>,
    name: Option<String>,
}

fn parse_attributes(line: &str) -> HashMap<String, String> {
    ATTRIBUTE_RE
        .captures_iter(line)
        .map(|caps| {
            let key = caps[1].to_string();
            let value = caps[2].trim_matches('"').to_string();
            (key, value)
        })
        .collect()
}

fn parse_rendition(attrs: &HashMap<String, String>) -> Rendition {
    Rendition {
        uri: attrs.get("URI").cloned(),
        group_id: attrs.get("GROUP-ID").cloned(),
        language: attrs.get("LANGUAGE").cloned(),
        name: attrs.get("NAME").cloned(),
    }
}

fn has_video_codec(codecs: &str) -> bool {
    codecs.split(',').any(|codec| {
        let codec = codec.trim().to_ascii_lowercase();
        VIDEO_CODEC_PREFIXES.iter().any(|p| codec.starts_with(p))
    })
}

/// Parses an adaptive playlist.
///
/// # Errors
///
/// [`ParseError`] when the `#EXTM3U` leader is missing.
pub fn parse(body: &[u8], base_url: &Url, id_prefix: &str) -> Result<ManifestOutput, ParseError> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_start_matches('\u{feff}');

    if !text.trim_start().starts_with("#EXTM3U") {
        return Err(ParseError::malformed(
            ManifestFamily::Hls,
            base_url,
            "missing #EXTM3U leader",
        ));
    }

    let mut output = ManifestOutput::default();
    let mut audio_language_by_group: HashMap<String, String> = HashMap::new();
    let mut pending_variant: Option<HashMap<String, String>> = None;
    let mut is_media_playlist = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(attr_list) = line.strip_prefix("#EXT-X-MEDIA:") {
            let attrs = parse_attributes(attr_list);
            let rendition = parse_rendition(&attrs);
            match attrs.get("TYPE").map(String::as_str) {
                Some("SUBTITLES") => {
                    if let Some(url) =
                        rendition.uri.as_deref().and_then(|u| resolve_ref(u, base_url))
                    {
                        let lang = rendition.language.clone().unwrap_or_else(|| "und".to_string());
                        let mut track = SubtitleTrack::with_ext(url, "vtt");
                        track.display_name = rendition.name.clone();
                        add_subtitle_track(&mut output.subtitles, &lang, track);
                    }
                }
                Some("AUDIO") => {
                    if let (Some(group), Some(lang)) = (&rendition.group_id, &rendition.language) {
                        audio_language_by_group
                            .entry(group.clone())
                            .or_insert_with(|| lang.clone());
                    }
                    if let Some(url) =
                        rendition.uri.as_deref().and_then(|u| resolve_ref(u, base_url))
                    {
                        let format_id = join_format_id(&[
                            Some(id_prefix),
                            Some("audio"),
                            rendition.group_id.as_deref(),
                            rendition.name.as_deref().or(rendition.language.as_deref()),
                        ]);
                        let mut format = FormatDescriptor::new(format_id, url, Protocol::Hls);
                        format.ext = Some("mp4".to_string());
                        format.language = rendition.language.clone();
                        format.audio_only = true;
                        output.formats.push(format);
                    }
                }
                _ => {}
            }
        } else if let Some(attr_list) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending_variant = Some(parse_attributes(attr_list));
        } else if line.starts_with("#EXTINF:") {
            is_media_playlist = true;
        } else if line.starts_with('#') {
            // Unhandled tag; a pending variant still waits for its URI line.
        } else if let Some(attrs) = pending_variant.take() {
            let Some(url) = resolve_ref(line, base_url) else {
                continue;
            };

            let bitrate = attrs
                .get("AVERAGE-BANDWIDTH")
                .or_else(|| attrs.get("BANDWIDTH"))
                .and_then(|v| v.parse::<u64>().ok())
                .map(|bps| u32::try_from(bps / 1000).unwrap_or(u32::MAX));

            let (width, height) = attrs
                .get("RESOLUTION")
                .and_then(|r| r.split_once('x'))
                .map_or((None, None), |(w, h)| (w.parse().ok(), h.parse().ok()));

            let codecs = attrs.get("CODECS");
            let audio_only =
                width.is_none() && codecs.is_some_and(|c| !has_video_codec(c));

            let bitrate_token = bitrate.map(|b| b.to_string());
            let fallback_token = output.formats.len().to_string();
            let format_id = join_format_id(&[
                Some(id_prefix),
                Some(bitrate_token.as_deref().unwrap_or(&fallback_token)),
            ]);

            let mut format = FormatDescriptor::new(format_id, url, Protocol::Hls);
            format.ext = Some("mp4".to_string());
            format.bitrate = bitrate;
            format.width = width;
            format.height = height;
            format.audio_only = audio_only;
            format.language = attrs
                .get("AUDIO")
                .and_then(|group| audio_language_by_group.get(group))
                .cloned();
            output.formats.push(format);
        }
    }

    // A media playlist is itself the single downloadable rendition.
    if output.formats.is_empty() && is_media_playlist {
        let mut format =
            FormatDescriptor::new(id_prefix.to_string(), base_url.clone(), Protocol::Hls);
        format.ext = Some("mp4".to_string());
        output.formats.push(format);
    }

    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example.com/vod/master.m3u8").unwrap()
    }

    // ==================== Master Playlist Tests ====================

    #[test]
    fn test_master_playlist_variants() {
        let doc = b"#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
            low/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
            hi/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();

        assert_eq!(output.formats.len(), 2);
        let low = &output.formats[0];
        assert_eq!(low.format_id, "hls-1280");
        assert_eq!(low.bitrate, Some(1280));
        assert_eq!(low.width, Some(640));
        assert_eq!(low.height, Some(360));
        assert_eq!(
            low.url.as_str(),
            "https://cdn.example.com/vod/low/index.m3u8"
        );
        assert!(!low.audio_only);
    }

    #[test]
    fn test_average_bandwidth_preferred() {
        let doc = b"#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2000000,AVERAGE-BANDWIDTH=1500000\n\
            v/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();
        assert_eq!(output.formats[0].bitrate, Some(1500));
    }

    #[test]
    fn test_audio_only_variant_detected() {
        let doc = b"#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=128000,CODECS=\"mp4a.40.2\"\n\
            audio/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();
        assert!(output.formats[0].audio_only);
    }

    #[test]
    fn test_audio_rendition_and_group_language() {
        let doc = b"#EXTM3U\n\
            #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aac\",LANGUAGE=\"de\",NAME=\"German\",URI=\"audio/de.m3u8\"\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1000000,RESOLUTION=640x360,AUDIO=\"aac\"\n\
            v/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();

        assert_eq!(output.formats.len(), 2);
        let audio = output.formats.iter().find(|f| f.audio_only).unwrap();
        assert_eq!(audio.format_id, "hls-audio-aac-German");
        assert_eq!(audio.language.as_deref(), Some("de"));

        let video = output.formats.iter().find(|f| !f.audio_only).unwrap();
        assert_eq!(video.language.as_deref(), Some("de"), "inherits group language");
    }

    #[test]
    fn test_subtitle_renditions() {
        let doc = b"#EXTM3U\n\
            #EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",LANGUAGE=\"en\",NAME=\"English\",URI=\"subs/en.m3u8\"\n\
            #EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"Unknown\",URI=\"subs/und.m3u8\"\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1000000\n\
            v/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();

        assert_eq!(output.subtitles["en"].len(), 1);
        assert_eq!(output.subtitles["en"][0].ext.as_deref(), Some("vtt"));
        assert_eq!(
            output.subtitles["en"][0].url.as_str(),
            "https://cdn.example.com/vod/subs/en.m3u8"
        );
        assert_eq!(output.subtitles["und"].len(), 1, "no language falls back to und");
    }

    #[test]
    fn test_interleaved_tags_between_variant_and_uri() {
        let doc = b"#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1000000\n\
            #EXT-X-SOME-FUTURE-TAG:X=1\n\
            v/index.m3u8\n";
        let output = parse(doc, &base(), "hls").unwrap();
        assert_eq!(output.formats.len(), 1);
    }

    // ==================== Media Playlist Tests ====================

    #[test]
    fn test_media_playlist_yields_single_format() {
        let doc = b"#EXTM3U\n\
            #EXT-X-TARGETDURATION:6\n\
            #EXTINF:6.0,\n\
            seg-1.ts\n\
            #EXTINF:6.0,\n\
            seg-2.ts\n\
            #EXT-X-ENDLIST\n";
        let output = parse(doc, &base(), "hls").unwrap();
        assert_eq!(output.formats.len(), 1);
        assert_eq!(output.formats[0].format_id, "hls");
        assert_eq!(output.formats[0].url, base());
    }

    // ==================== Malformed Input Tests ====================

    #[test]
    fn test_missing_leader_is_error() {
        let err = parse(b"<html>not a playlist</html>", &base(), "hls").unwrap_err();
        assert!(err.to_string().contains("#EXTM3U"));
    }

    #[test]
    fn test_empty_master_is_empty_not_error() {
        let output = parse(b"#EXTM3U\n#EXT-X-VERSION:3\n", &base(), "hls").unwrap();
        assert!(output.formats.is_empty());
        assert!(output.subtitles.is_empty());
    }
}
