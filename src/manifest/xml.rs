//! Small helpers over quick-xml shared by the XML manifest parsers.

use quick_xml::events::BytesStart;

/// Value of the named attribute (namespace-insensitive), trimmed.
pub(crate) fn attr(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Named attribute parsed as `u32`.
pub(crate) fn attr_u32(start: &BytesStart<'_>, name: &str) -> Option<u32> {
    attr(start, name).and_then(|v| v.parse().ok())
}

/// Named attribute parsed as `u64`.
pub(crate) fn attr_u64(start: &BytesStart<'_>, name: &str) -> Option<u64> {
    attr(start, name).and_then(|v| v.parse().ok())
}

/// Bits-per-second attribute scaled to kbit/s (clamped into `u32`).
pub(crate) fn attr_bitrate_kbps(start: &BytesStart<'_>, name: &str) -> Option<u32> {
    attr_u64(start, name).map(|bps| u32::try_from(bps / 1000).unwrap_or(u32::MAX))
}
