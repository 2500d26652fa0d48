//! Error type for manifest parsing.

use thiserror::Error;

use super::ManifestFamily;

/// A manifest document did not have the structure its family requires.
///
/// Parse errors are non-fatal at the asset-type level: the catalog records
/// them and moves on, escalating only when no asset type produced formats.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The document is not a valid instance of its manifest family
    #[error("{family} manifest from '{url}' is malformed: {reason}")]
    Malformed {
        /// Manifest family that was being parsed
        family: ManifestFamily,
        /// Where the document came from
        url: String,
        /// What was wrong
        reason: String,
    },

    /// Neither the URL shape nor the document leader identified a family
    #[error("manifest from '{url}' matches no known family")]
    UnknownFamily {
        /// Where the document came from
        url: String,
    },
}

impl ParseError {
    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(family: ManifestFamily, url: &url::Url, reason: impl Into<String>) -> Self {
        Self::Malformed {
            family,
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `UnknownFamily` error.
    #[must_use]
    pub fn unknown_family(url: &url::Url) -> Self {
        Self::UnknownFamily {
            url: url.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_family_and_url() {
        let url = url::Url::parse("https://cdn.example.com/master.m3u8").unwrap();
        let err = ParseError::malformed(ManifestFamily::Hls, &url, "missing #EXTM3U header");
        let msg = err.to_string();
        assert!(msg.contains("hls"));
        assert!(msg.contains("master.m3u8"));
        assert!(msg.contains("#EXTM3U"));
    }
}
