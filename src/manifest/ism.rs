//! Fragmented-index manifest parser (Smooth Streaming).
//!
//! Every format keeps the manifest URL itself as its media URL; the
//! downloader re-reads the index to assemble fragment requests. Text
//! stream indexes become subtitle tracks the same way.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

use super::xml::{attr, attr_u32, attr_bitrate_kbps};
use super::{ManifestFamily, ManifestOutput, ParseError};
use crate::media::{
    FormatDescriptor, Protocol, SubtitleTrack, add_subtitle_track, join_format_id,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Audio,
    Video,
    Text,
    Other,
}

/// One open `<StreamIndex>` scope.
struct IndexScope {
    kind: StreamKind,
    language: Option<String>,
}

fn open_index(e: &BytesStart<'_>) -> IndexScope {
    let kind = match attr(e, "Type").as_deref() {
        Some("audio") => StreamKind::Audio,
        Some("video") => StreamKind::Video,
        Some("text") => StreamKind::Text,
        _ => StreamKind::Other,
    };
    IndexScope {
        kind,
        language: attr(e, "Language"),
    }
}

fn quality_level(
    e: &BytesStart<'_>,
    scope: &IndexScope,
    manifest_url: &Url,
    id_prefix: &str,
    output: &mut ManifestOutput,
) {
    if !matches!(scope.kind, StreamKind::Audio | StreamKind::Video) {
        return;
    }

    let bitrate = attr_bitrate_kbps(e, "Bitrate");
    let bitrate_token = bitrate.map(|b| b.to_string());
    let fallback_token = output.formats.len().to_string();
    let format_id = join_format_id(&[
        Some(id_prefix),
        Some(bitrate_token.as_deref().unwrap_or(&fallback_token)),
    ]);

    let mut format = FormatDescriptor::new(format_id, manifest_url.clone(), Protocol::Ism);
    format.bitrate = bitrate;
    format.language = scope.language.clone();
    match scope.kind {
        StreamKind::Audio => {
            format.ext = Some("isma".to_string());
            format.audio_only = true;
        }
        StreamKind::Video => {
            format.ext = Some("ismv".to_string());
            format.video_only = true;
            format.width = attr_u32(e, "MaxWidth");
            format.height = attr_u32(e, "MaxHeight");
        }
        StreamKind::Text | StreamKind::Other => {}
    }
    output.formats.push(format);
}

/// Parses a fragmented-index manifest.
///
/// # Errors
///
/// [`ParseError`] when the document is not well-formed XML or the root
/// element is not a smooth-streaming media description.
pub fn parse(body: &[u8], base_url: &Url, id_prefix: &str) -> Result<ManifestOutput, ParseError> {
    let text = String::from_utf8_lossy(body);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut output = ManifestOutput::default();
    let mut buf = Vec::new();
    let mut saw_root = false;
    let mut index: Option<IndexScope> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"SmoothStreamingMedia" => saw_root = true,
                b"StreamIndex" => {
                    let scope = open_index(&e);
                    if scope.kind == StreamKind::Text {
                        let lang = scope.language.clone().unwrap_or_else(|| "und".to_string());
                        add_subtitle_track(
                            &mut output.subtitles,
                            &lang,
                            SubtitleTrack::with_ext(base_url.clone(), "ismt"),
                        );
                    }
                    index = Some(scope);
                }
                b"QualityLevel" => {
                    if let Some(scope) = &index {
                        quality_level(&e, scope, base_url, id_prefix, &mut output);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"StreamIndex" {
                    index = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::malformed(
                    ManifestFamily::Ism,
                    base_url,
                    format!("invalid XML: {e}"),
                ));
            }
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ParseError::malformed(
            ManifestFamily::Ism,
            base_url,
            "missing SmoothStreamingMedia root element",
        ));
    }

    Ok(output)
}
