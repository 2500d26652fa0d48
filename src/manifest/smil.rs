//! Synchronized-layout XML manifest parser (SMIL).
//!
//! A head `<meta>` can rebase all media references; `<video>` and `<audio>`
//! body elements carry the actual variants. Subtitles arrive two ways:
//! `<textstream>` elements and well-known caption `<param>` entries.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

use super::xml::{attr, attr_u32, attr_bitrate_kbps};
use super::{ManifestFamily, ManifestOutput, ParseError, resolve_ref};
use crate::media::{
    FormatDescriptor, Protocol, SubtitleTrack, add_subtitle_track, join_format_id,
};

/// Caption param names and the caption format each one carries.
const CAPTION_PARAMS: &[(&str, &str)] = &[
    ("sMPTE-TTCCURL", "tt"),
    ("ClosedCaptionURL", "ttml"),
    ("webVTTCaptionURL", "vtt"),
];

/// Language used for caption params, which never state one.
const CAPTION_PARAM_LANG: &str = "en";

fn path_ext(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(char::is_alphanumeric) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

struct SmilWalker<'a> {
    base: Url,
    id_prefix: &'a str,
    output: ManifestOutput,
}

impl SmilWalker<'_> {
    fn element(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"meta" => self.meta(e),
            b"video" => self.media(e, false),
            b"audio" => self.media(e, true),
            b"textstream" => self.textstream(e),
            b"param" => self.param(e),
            _ => {}
        }
    }

    fn meta(&mut self, e: &BytesStart<'_>) {
        let reference = attr(e, "base").or_else(|| {
            match attr(e, "name").as_deref() {
                Some("base" | "httpBase") => attr(e, "content"),
                _ => None,
            }
        });
        if let Some(resolved) = reference.and_then(|r| resolve_ref(&r, &self.base)) {
            self.base = resolved;
        }
    }

    fn media(&mut self, e: &BytesStart<'_>, audio_only: bool) {
        let Some(url) = attr(e, "src").and_then(|s| resolve_ref(&s, &self.base)) else {
            return;
        };
        let bitrate = attr_bitrate_kbps(e, "system-bitrate");

        let bitrate_token = bitrate.map(|b| b.to_string());
        let fallback_token = self.output.formats.len().to_string();
        let format_id = join_format_id(&[
            Some(self.id_prefix),
            Some(bitrate_token.as_deref().unwrap_or(&fallback_token)),
        ]);

        let ext = path_ext(&url).unwrap_or_else(|| "mp4".to_string());
        let mut format = FormatDescriptor::new(format_id, url, Protocol::DirectHttp);
        format.ext = Some(ext);
        format.bitrate = bitrate;
        format.width = attr_u32(e, "width");
        format.height = attr_u32(e, "height");
        format.audio_only = audio_only;
        self.output.formats.push(format);
    }

    fn textstream(&mut self, e: &BytesStart<'_>) {
        let Some(url) = attr(e, "src").and_then(|s| resolve_ref(&s, &self.base)) else {
            return;
        };
        let lang = attr(e, "systemLanguage").unwrap_or_else(|| "und".to_string());
        let mut track = SubtitleTrack::new(url);
        track.ext = attr(e, "ext").or_else(|| path_ext(&track.url));
        add_subtitle_track(&mut self.output.subtitles, &lang, track);
    }

    fn param(&mut self, e: &BytesStart<'_>) {
        let (Some(name), Some(value)) = (attr(e, "name"), attr(e, "value")) else {
            return;
        };
        let Some((_, ext)) = CAPTION_PARAMS.iter().find(|(n, _)| *n == name) else {
            return;
        };
        if let Some(url) = resolve_ref(&value, &self.base) {
            add_subtitle_track(
                &mut self.output.subtitles,
                CAPTION_PARAM_LANG,
                SubtitleTrack::with_ext(url, ext),
            );
        }
    }
}

/// Parses a synchronized-layout manifest.
///
/// # Errors
///
/// [`ParseError`] when the document is not well-formed XML.
pub fn parse(body: &[u8], base_url: &Url, id_prefix: &str) -> Result<ManifestOutput, ParseError> {
    let text = String::from_utf8_lossy(body);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut walker = SmilWalker {
        base: base_url.clone(),
        id_prefix,
        output: ManifestOutput::default(),
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => walker.element(&e),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::malformed(
                    ManifestFamily::Smil,
                    base_url,
                    format!("invalid XML: {e}"),
                ));
            }
        }
        buf.clear();
    }

    Ok(walker.output)
}
