//! Legacy flash media manifest parser (F4M).
//!
//! Flat `<manifest>` with `<media>` children; a `<baseURL>` text element
//! rebases relative references. Multi-level manifests point at nested
//! manifests through `href`, which is treated like `url` here.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

use super::xml::{attr, attr_u32};
use super::{ManifestFamily, ManifestOutput, ParseError, resolve_ref};
use crate::media::{FormatDescriptor, Protocol, join_format_id};

fn media(e: &BytesStart<'_>, base: &Url, id_prefix: &str, output: &mut ManifestOutput) {
    let reference = attr(e, "url").or_else(|| attr(e, "href"));
    let Some(url) = reference.and_then(|r| resolve_ref(&r, base)) else {
        return;
    };

    // The bitrate attribute is declared in kbit/s already.
    let bitrate = attr_u32(e, "bitrate");
    let bitrate_token = bitrate.map(|b| b.to_string());
    let fallback_token = output.formats.len().to_string();
    let format_id = join_format_id(&[
        Some(id_prefix),
        Some(bitrate_token.as_deref().unwrap_or(&fallback_token)),
    ]);

    let mut format = FormatDescriptor::new(format_id, url, Protocol::F4m);
    format.ext = Some("flv".to_string());
    format.bitrate = bitrate;
    format.width = attr_u32(e, "width");
    format.height = attr_u32(e, "height");
    output.formats.push(format);
}

/// Parses a flash media manifest.
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
    let mut base = base_url.clone();
    let mut capture_base = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"baseURL" => capture_base = true,
                b"media" => media(&e, &base, id_prefix, &mut output),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"media" {
                    media(&e, &base, id_prefix, &mut output);
                }
            }
            Ok(Event::Text(e)) if capture_base => {
                let resolved = e
                    .unescape()
                    .ok()
                    .and_then(|reference| resolve_ref(reference.trim(), &base));
                if let Some(resolved) = resolved {
                    base = resolved;
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"baseURL" {
                    capture_base = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::malformed(
                    ManifestFamily::F4m,
                    base_url,
                    format!("invalid XML: {e}"),
                ));
            }
        }
        buf.clear();
    }

    Ok(output)
}
