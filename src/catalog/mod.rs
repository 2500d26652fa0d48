//! Format aggregation across asset types with partial-failure accounting.
//!
//! A media page rarely has one manifest: providers expose the same content
//! over several stream technologies and the catalog walks them all. Rules
//! it enforces:
//!
//! - Each manifest is fetched and parsed at most once per resolution
//!   (keyed by URL, or by content digest for inline documents).
//! - A failing asset type is recorded and the walk continues; failures
//!   only escalate when the walk ends with zero formats.
//! - When escalation happens, the error raised is the one from the
//!   highest discovery index, regardless of completion order.
//! - A source marked `must_succeed` is exempt from the record-and-continue
//!   rule: its failure aborts the walk immediately.
//!
//! Discovery order is the submission order of sources, so results are
//! reproducible even when fetches run concurrently.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

use futures_util::StreamExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;
use crate::manifest::{ManifestFamily, ManifestOutput, ParseError, parse_manifest};
use crate::media::{FormatDescriptor, SubtitleMap, merge_subtitle_map};
use crate::transport::{RequestDirector, RequestSpec};

/// Where a manifest document lives.
#[derive(Debug, Clone)]
pub enum ManifestLocation {
    /// Fetch the document from this URL through the director.
    Remote(Url),
    /// The document already arrived inline (API side channel); relative
    /// references resolve against `base_url`.
    Inline { body: Vec<u8>, base_url: Url },
}

/// One candidate manifest to walk: a location plus parsing directions.
#[derive(Debug, Clone)]
pub struct AssetSource {
    pub location: ManifestLocation,
    /// Parser family override. `None` infers from the URL extension, then
    /// from the document leader.
    pub family: Option<ManifestFamily>,
    /// Format-id prefix for everything this source yields.
    pub id_prefix: String,
    /// Failure of this source aborts the whole walk instead of being
    /// recorded.
    pub must_succeed: bool,
}

impl AssetSource {
    /// A manifest to fetch from `url`.
    #[must_use]
    pub fn remote(url: Url, id_prefix: impl Into<String>) -> Self {
        Self {
            location: ManifestLocation::Remote(url),
            family: None,
            id_prefix: id_prefix.into(),
            must_succeed: false,
        }
    }

    /// A manifest document already in hand.
    #[must_use]
    pub fn inline(body: Vec<u8>, base_url: Url, id_prefix: impl Into<String>) -> Self {
        Self {
            location: ManifestLocation::Inline { body, base_url },
            family: None,
            id_prefix: id_prefix.into(),
            must_succeed: false,
        }
    }

    /// Pins the parser family instead of inferring it.
    #[must_use]
    pub fn with_family(mut self, family: ManifestFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Makes this source's failure immediately fatal.
    #[must_use]
    pub fn require_success(mut self) -> Self {
        self.must_succeed = true;
        self
    }
}

/// Dedup key for the at-most-once rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SeenKey {
    Url(String),
    InlineDigest(u64),
}

impl SeenKey {
    fn of(location: &ManifestLocation) -> Self {
        match location {
            ManifestLocation::Remote(url) => Self::Url(url.to_string()),
            ManifestLocation::Inline { body, .. } => {
                let mut hasher = DefaultHasher::new();
                body.hash(&mut hasher);
                Self::InlineDigest(hasher.finish())
            }
        }
    }
}

/// Aggregates formats and subtitles for one media id across asset sources.
#[derive(Debug)]
pub struct FormatCatalog {
    media_id: String,
    seen: HashSet<SeenKey>,
    formats: Vec<FormatDescriptor>,
    subtitles: SubtitleMap,
    /// Recorded non-fatal failures as (discovery index, error).
    failures: Vec<(usize, ResolveError)>,
    next_index: usize,
}

impl FormatCatalog {
    /// Creates an empty catalog for `media_id`.
    #[must_use]
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            seen: HashSet::new(),
            formats: Vec::new(),
            subtitles: SubtitleMap::new(),
            failures: Vec::new(),
            next_index: 0,
        }
    }

    /// True once at least one format has been merged.
    #[must_use]
    pub fn has_formats(&self) -> bool {
        !self.formats.is_empty()
    }

    /// Claims the next discovery index for a source, or `None` when its
    /// manifest was already walked.
    fn stage(&mut self, source: &AssetSource) -> Option<usize> {
        let key = SeenKey::of(&source.location);
        if !self.seen.insert(key) {
            debug!(
                media_id = %self.media_id,
                id_prefix = %source.id_prefix,
                "manifest already walked, skipping"
            );
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(index)
    }

    fn merge(&mut self, output: ManifestOutput) {
        self.formats.extend(output.formats);
        merge_subtitle_map(&mut self.subtitles, output.subtitles);
    }

    fn record(&mut self, index: usize, must_succeed: bool, error: ResolveError) -> Result<(), ResolveError> {
        if must_succeed {
            return Err(error);
        }
        warn!(media_id = %self.media_id, index, error = %error, "asset source failed, continuing");
        self.failures.push((index, error));
        Ok(())
    }

    /// Walks one source: fetch if remote, parse, merge.
    ///
    /// # Errors
    ///
    /// Only for `must_succeed` sources; other failures are recorded.
    #[tracing::instrument(skip(self, director, source), fields(media_id = %self.media_id, id_prefix = %source.id_prefix))]
    pub async fn collect(
        &mut self,
        director: &RequestDirector,
        source: AssetSource,
    ) -> Result<(), ResolveError> {
        let Some(index) = self.stage(&source) else {
            return Ok(());
        };
        let must_succeed = source.must_succeed;
        match fetch_and_parse(director, source).await {
            Ok(output) => {
                self.merge(output);
                Ok(())
            }
            Err(error) => self.record(index, must_succeed, error),
        }
    }

    /// Walks sources one after another, in discovery order.
    ///
    /// # Errors
    ///
    /// Only when a `must_succeed` source fails.
    pub async fn collect_all(
        &mut self,
        director: &RequestDirector,
        sources: Vec<AssetSource>,
    ) -> Result<(), ResolveError> {
        for source in sources {
            self.collect(director, source).await?;
        }
        Ok(())
    }

    /// Walks sources with up to `limit` fetches in flight.
    ///
    /// Results merge strictly in discovery order, so the format list and
    /// the escalation error match what [`collect_all`](Self::collect_all)
    /// would have produced.
    ///
    /// # Errors
    ///
    /// Only when a `must_succeed` source fails.
    #[tracing::instrument(skip(self, director, sources), fields(media_id = %self.media_id, sources = sources.len()))]
    pub async fn collect_concurrent(
        &mut self,
        director: &RequestDirector,
        sources: Vec<AssetSource>,
        limit: usize,
    ) -> Result<(), ResolveError> {
        let mut staged = Vec::new();
        for source in sources {
            if let Some(index) = self.stage(&source) {
                staged.push((index, source));
            }
        }

        let mut outcomes = futures_util::stream::iter(staged.into_iter().map(
            |(index, source)| {
                let must_succeed = source.must_succeed;
                async move { (index, must_succeed, fetch_and_parse(director, source).await) }
            },
        ))
        .buffered(limit.max(1));

        while let Some((index, must_succeed, outcome)) = outcomes.next().await {
            match outcome {
                Ok(output) => self.merge(output),
                Err(error) => self.record(index, must_succeed, error)?,
            }
        }
        Ok(())
    }

    /// Merges formats the extractor produced without a manifest
    /// (progressive URLs, API-described streams).
    pub fn add_formats(&mut self, formats: Vec<FormatDescriptor>) {
        self.formats.extend(formats);
    }

    /// Merges subtitle tracks from an API side channel.
    pub fn merge_subtitles(&mut self, incoming: SubtitleMap) {
        merge_subtitle_map(&mut self.subtitles, incoming);
    }

    /// Records an extractor-level failure (failed watch call, bad envelope)
    /// under the next discovery index, so it participates in escalation
    /// exactly like a failed manifest.
    pub fn record_failure(&mut self, error: ResolveError) {
        let index = self.next_index;
        self.next_index += 1;
        warn!(media_id = %self.media_id, index, error = %error, "recorded resolution failure");
        self.failures.push((index, error));
    }

    /// Closes the walk: disambiguates colliding format ids and applies the
    /// empty-catalog escalation.
    ///
    /// # Errors
    ///
    /// With zero formats: the recorded failure with the highest discovery
    /// index, or [`ResolveError::NoFormatsFound`] when nothing failed.
    pub fn finish(mut self) -> Result<(Vec<FormatDescriptor>, SubtitleMap), ResolveError> {
        if self.formats.is_empty() {
            let last = self
                .failures
                .into_iter()
                .max_by_key(|(index, _)| *index)
                .map(|(_, error)| error);
            return Err(last.unwrap_or_else(|| ResolveError::no_formats(&self.media_id)));
        }

        disambiguate_format_ids(&mut self.formats);
        debug!(
            media_id = %self.media_id,
            formats = self.formats.len(),
            subtitle_langs = self.subtitles.len(),
            failures = self.failures.len(),
            "catalog closed"
        );
        Ok((self.formats, self.subtitles))
    }
}

/// Appends `-2`, `-3`, ... to later occurrences of a repeated format id,
/// keeping ids unique without disturbing discovery order.
fn disambiguate_format_ids(formats: &mut [FormatDescriptor]) {
    use std::collections::HashMap;

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for format in formats.iter_mut() {
        let count = occurrences.entry(format.format_id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            format.format_id = format!("{}-{}", format.format_id, count);
        }
    }
}

/// Resolves one source to parser output. Remote documents resolve relative
/// references against the final (post-redirect) URL.
async fn fetch_and_parse(
    director: &RequestDirector,
    source: AssetSource,
) -> Result<ManifestOutput, ResolveError> {
    let (body, base_url) = match source.location {
        ManifestLocation::Remote(url) => {
            let response = director.dispatch(&RequestSpec::get(url)).await?;
            let base = response.final_url.clone();
            (response.body, base)
        }
        ManifestLocation::Inline { body, base_url } => (body, base_url),
    };

    let family = source
        .family
        .or_else(|| ManifestFamily::from_url(&base_url))
        .or_else(|| ManifestFamily::sniff(&body))
        .ok_or_else(|| ParseError::unknown_family(&base_url))?;

    let output = parse_manifest(family, &body, &base_url, &source.id_prefix)?;
    debug!(
        family = %family,
        formats = output.formats.len(),
        "manifest parsed"
    );
    Ok(output)
}
