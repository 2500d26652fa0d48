//! MPEG-DASH presentation description parser.
//!
//! Walks `MPD > Period > AdaptationSet > Representation`, honouring
//! `BaseURL` overrides at every level. Audio and video live in separate
//! adaptation sets; text sets surface as subtitle tracks instead of
//! formats.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

use super::xml::{attr, attr_bitrate_kbps, attr_u32};
use super::{ManifestFamily, ManifestOutput, ParseError, resolve_ref};
use crate::media::{
    FormatDescriptor, Protocol, SubtitleTrack, add_subtitle_track, join_format_id,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Audio,
    Video,
    Text,
    Other,
}

fn content_kind(content_type: Option<&str>, mime_type: Option<&str>) -> ContentKind {
    match content_type {
        Some("audio") => return ContentKind::Audio,
        Some("video") => return ContentKind::Video,
        Some("text") => return ContentKind::Text,
        _ => {}
    }
    match mime_type {
        Some(m) if m.starts_with("audio/") => ContentKind::Audio,
        Some(m) if m.starts_with("video/") => ContentKind::Video,
        Some(m) if m.starts_with("text/") || m.contains("ttml") => ContentKind::Text,
        _ => ContentKind::Other,
    }
}

fn subtitle_ext(mime_type: Option<&str>, codecs: Option<&str>) -> &'static str {
    if mime_type.is_some_and(|m| m.contains("vtt")) || codecs.is_some_and(|c| c.contains("wvtt")) {
        "vtt"
    } else {
        "ttml"
    }
}

struct SetScope {
    kind: ContentKind,
    lang: Option<String>,
    mime_type: Option<String>,
    base: Url,
}

struct ReprScope {
    id: Option<String>,
    bitrate: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    mime_type: Option<String>,
    codecs: Option<String>,
    base: Url,
}

fn open_set(e: &BytesStart<'_>, base: &Url) -> SetScope {
    let mime_type = attr(e, "mimeType");
    SetScope {
        kind: content_kind(attr(e, "contentType").as_deref(), mime_type.as_deref()),
        lang: attr(e, "lang"),
        mime_type,
        base: base.clone(),
    }
}

fn open_repr(e: &BytesStart<'_>, set: &SetScope) -> ReprScope {
    ReprScope {
        id: attr(e, "id"),
        bitrate: attr_bitrate_kbps(e, "bandwidth"),
        width: attr_u32(e, "width"),
        height: attr_u32(e, "height"),
        mime_type: attr(e, "mimeType").or_else(|| set.mime_type.clone()),
        codecs: attr(e, "codecs"),
        base: set.base.clone(),
    }
}

fn close_repr(repr: ReprScope, set: &SetScope, id_prefix: &str, output: &mut ManifestOutput) {
    let kind = match set.kind {
        ContentKind::Other => content_kind(None, repr.mime_type.as_deref()),
        kind => kind,
    };

    if kind == ContentKind::Text {
        let lang = set.lang.clone().unwrap_or_else(|| "und".to_string());
        let ext = subtitle_ext(repr.mime_type.as_deref(), repr.codecs.as_deref());
        add_subtitle_track(
            &mut output.subtitles,
            &lang,
            SubtitleTrack::with_ext(repr.base, ext),
        );
        return;
    }

    let bitrate_token = repr.bitrate.map(|b| b.to_string());
    let fallback_token = output.formats.len().to_string();
    let format_id = join_format_id(&[
        Some(id_prefix),
        Some(
            repr.id
                .as_deref()
                .or(bitrate_token.as_deref())
                .unwrap_or(&fallback_token),
        ),
    ]);

    let mut format = FormatDescriptor::new(format_id, repr.base, Protocol::Dash);
    format.ext = Some("mp4".to_string());
    format.bitrate = repr.bitrate;
    format.width = repr.width;
    format.height = repr.height;
    format.language = set.lang.clone();
    format.audio_only = kind == ContentKind::Audio;
    format.video_only = kind == ContentKind::Video;
    output.formats.push(format);
}

/// Parses a presentation description.
///
/// # Errors
///
/// [`ParseError`] when the document is not well-formed XML.
pub fn parse(body: &[u8], base_url: &Url, id_prefix: &str) -> Result<ManifestOutput, ParseError> {
    let text = String::from_utf8_lossy(body);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut output = ManifestOutput::default();
    let mut buf = Vec::new();

    let mut mpd_base = base_url.clone();
    let mut period_base = base_url.clone();
    let mut in_period = false;
    let mut set: Option<SetScope> = None;
    let mut repr: Option<ReprScope> = None;
    let mut capture_base = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Period" => {
                    in_period = true;
                    period_base = mpd_base.clone();
                }
                b"AdaptationSet" => set = Some(open_set(&e, &period_base)),
                b"Representation" => {
                    if let Some(scope) = &set {
                        repr = Some(open_repr(&e, scope));
                    }
                }
                b"BaseURL" => capture_base = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Representation" {
                    if let Some(scope) = &set {
                        close_repr(open_repr(&e, scope), scope, id_prefix, &mut output);
                    }
                }
            }
            Ok(Event::Text(e)) if capture_base => {
                if let Some(reference) = e.unescape().ok().map(|c| c.into_owned()) {
                    let scope_base = repr
                        .as_ref()
                        .map(|r| &r.base)
                        .or_else(|| set.as_ref().map(|s| &s.base))
                        .unwrap_or(if in_period { &period_base } else { &mpd_base });
                    if let Some(resolved) = resolve_ref(reference.trim(), scope_base) {
                        if let Some(r) = &mut repr {
                            r.base = resolved;
                        } else if let Some(s) = &mut set {
                            s.base = resolved;
                        } else if in_period {
                            period_base = resolved;
                        } else {
                            mpd_base = resolved;
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"BaseURL" => capture_base = false,
                b"Representation" => {
                    if let (Some(r), Some(scope)) = (repr.take(), &set) {
                        close_repr(r, scope, id_prefix, &mut output);
                    }
                }
                b"AdaptationSet" => set = None,
                b"Period" => in_period = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::malformed(
                    ManifestFamily::Dash,
                    base_url,
                    format!("invalid XML: {e}"),
                ));
            }
        }
        buf.clear();
    }

    Ok(output)
}
