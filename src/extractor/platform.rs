//! The shipped portal extractor.
//!
//! TV portals of this family differ only in hostnames and branding; one
//! extractor parameterized by [`ProviderConfig`] serves them all. A
//! resolution runs the full engine end to end:
//!
//! 1. `SessionContext::initialize` (token, hello, login),
//! 2. program details (newest API generation first, older as fallback),
//! 3. availability gate (geo block, subscription wall, external hosting),
//! 4. one watch call per configured stream technology, each yielding
//!    manifest URLs for the catalog,
//! 5. catalog walk, ranking, entry assembly.
//!
//! Live channels skip step 2; series URLs return a lazy playlist whose
//! entries redirect back into the registry one episode at a time.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::SiteExtractor;
use super::fallback::first_success;
use crate::catalog::{AssetSource, FormatCatalog};
use crate::error::ResolveError;
use crate::manifest::ManifestFamily;
use crate::media::{
    EntrySource, FormatDescriptor, LazyEntries, MediaEntry, MediaResult, Playlist, Protocol,
    QualityLadder, RedirectTarget, SubtitleMap, SubtitleTrack, add_subtitle_track, join_format_id,
};
use crate::rank::{FormatRanker, RankPolicy};
use crate::session::{Credentials, SessionContext, SessionInfo};
use crate::transport::{RequestDirector, RequestSpec};

/// Episodes per series page.
const PAGE_SIZE: usize = 100;

/// Quality tokens this portal family uses for label-only streams, worst
/// to best.
const QUALITY_LABELS: [&str; 5] = ["ld", "sd", "hd", "fhd", "uhd"];

const AVAILABILITY_GEO_BLOCKED: &str = "geo_blocked";
const AVAILABILITY_SUBSCRIPTION: &str = "subscription_required";

/// One delivery technology the portal's watch endpoint can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTechnology {
    Dash,
    Hls,
    Ism,
}

impl StreamTechnology {
    /// Token sent as `stream_type` and used as the format-id prefix.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Dash => "dash",
            Self::Hls => "hls",
            Self::Ism => "ism",
        }
    }

    /// Manifest family the watch URLs of this technology point at.
    #[must_use]
    pub fn family(self) -> ManifestFamily {
        match self {
            Self::Dash => ManifestFamily::Dash,
            Self::Hls => ManifestFamily::Hls,
            Self::Ism => ManifestFamily::Ism,
        }
    }
}

/// Everything that distinguishes one portal of the family from another.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider name for logs and error context.
    pub name: String,
    /// Host whose URLs this provider claims.
    pub portal_host: String,
    /// API root override; defaults to `https://{portal_host}/api/`.
    pub api_base: Option<Url>,
    /// Credential realm when several portals share one account system.
    pub auth_realm: Option<String>,
    /// Session hello language.
    pub language: String,
    /// Stream technologies to ask the watch endpoint for, in discovery
    /// order.
    pub technologies: Vec<StreamTechnology>,
    /// Manifest fetches allowed in flight at once.
    pub manifest_concurrency: usize,
    pub rank_policy: RankPolicy,
}

impl ProviderConfig {
    /// Creates a config with the family defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, portal_host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portal_host: portal_host.into(),
            api_base: None,
            auth_realm: None,
            language: "en".to_string(),
            technologies: vec![StreamTechnology::Dash, StreamTechnology::Hls],
            manifest_concurrency: 4,
            rank_policy: RankPolicy::default(),
        }
    }

    /// Overrides the API root.
    #[must_use]
    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = Some(api_base);
        self
    }

    /// Names the credential realm.
    #[must_use]
    pub fn with_auth_realm(mut self, realm: &str) -> Self {
        self.auth_realm = Some(realm.to_string());
        self
    }

    /// Sets the session language.
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Replaces the technology list.
    #[must_use]
    pub fn with_technologies(mut self, technologies: Vec<StreamTechnology>) -> Self {
        self.technologies = technologies;
        self
    }

    /// Bounds concurrent manifest fetches.
    #[must_use]
    pub fn with_manifest_concurrency(mut self, limit: usize) -> Self {
        self.manifest_concurrency = limit;
        self
    }

    /// Sets the ranking policy.
    #[must_use]
    pub fn with_rank_policy(mut self, policy: RankPolicy) -> Self {
        self.rank_policy = policy;
        self
    }

    fn resolved_api_base(&self) -> Result<Url, ResolveError> {
        if let Some(base) = &self.api_base {
            return Ok(base.clone());
        }
        Url::parse(&format!("https://{}/api/", self.portal_host)).map_err(|e| {
            ResolveError::unexpected(&self.name, &format!("cannot derive api base: {e}"))
        })
    }
}

/// URL kinds the portal serves.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Program { channel: String, id: String },
    Live { channel: String },
    Series { id: String },
}

/// Compiled URL patterns for one portal host.
struct PortalRoutes {
    program: Regex,
    live: Regex,
    series: Regex,
}

fn group(caps: &regex::Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

impl PortalRoutes {
    fn compile(provider: &str, portal_host: &str) -> Result<Self, ResolveError> {
        let host = regex::escape(portal_host);
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ResolveError::unexpected(provider, &format!("bad portal host pattern: {e}"))
            })
        };
        Ok(Self {
            program: build(&format!(
                r"^https?://(?:www\.)?{host}/watch/(?P<channel>[^/?#]+)/(?P<id>[0-9]+)"
            ))?,
            live: build(&format!(
                r"^https?://(?:www\.)?{host}/live/(?P<channel>[^/?#]+)"
            ))?,
            series: build(&format!(
                r"^https?://(?:www\.)?{host}/series/(?P<id>[0-9]+)"
            ))?,
        })
    }

    fn classify(&self, url: &Url) -> Option<Route> {
        let s = url.as_str();
        if let Some(caps) = self.program.captures(s) {
            return Some(Route::Program {
                channel: group(&caps, "channel")?,
                id: group(&caps, "id")?,
            });
        }
        if let Some(caps) = self.live.captures(s) {
            return Some(Route::Live {
                channel: group(&caps, "channel")?,
            });
        }
        if let Some(caps) = self.series.captures(s) {
            return Some(Route::Series {
                id: group(&caps, "id")?,
            });
        }
        None
    }
}

// ==================== Wire Payloads ====================

#[derive(Deserialize)]
struct ProgramEnvelope {
    #[serde(default)]
    programs: Vec<ProgramDetails>,
}

#[derive(Deserialize)]
struct ProgramDetails {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Seconds.
    #[serde(default)]
    duration: Option<f64>,
    /// Airing start, unix seconds.
    #[serde(default)]
    start: Option<i64>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    channel_title: Option<String>,
    /// Absent or "available" means watchable.
    #[serde(default)]
    availability: Option<String>,
    /// Set when the program is hosted on another platform.
    #[serde(default)]
    external_url: Option<String>,
    /// Progressive streams described directly by the API.
    #[serde(default)]
    streams: Vec<ApiStream>,
    /// Caption tracks described directly by the API.
    #[serde(default)]
    subtitles: Vec<ApiSubtitle>,
}

#[derive(Deserialize)]
struct ApiStream {
    url: String,
    /// Label from [`QUALITY_LABELS`], when the portal states one.
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct ApiSubtitle {
    url: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Deserialize)]
struct WatchEnvelope {
    stream: StreamPayload,
    #[serde(default)]
    channel: Option<ChannelSummary>,
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    watch_urls: Vec<WatchUrl>,
}

#[derive(Deserialize)]
struct WatchUrl {
    url: String,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    audio_channel: Option<String>,
}

#[derive(Deserialize)]
struct ChannelSummary {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct EpisodesEnvelope {
    #[serde(default)]
    episodes: Vec<EpisodeSummary>,
    /// Total episode count across all pages, when the portal reports it.
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Deserialize)]
struct EpisodeSummary {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

/// Generic portal extractor, one instance per provider.
pub struct PlatformExtractor {
    config: ProviderConfig,
    api_base: Url,
    routes: PortalRoutes,
    director: Arc<RequestDirector>,
    session: SessionContext,
    ranker: FormatRanker,
    quality_ladder: QualityLadder,
}

impl PlatformExtractor {
    /// Builds the extractor for one provider.
    ///
    /// # Errors
    ///
    /// When no API base can be derived from the config.
    pub fn new(
        config: ProviderConfig,
        director: Arc<RequestDirector>,
        credentials: Option<Credentials>,
    ) -> Result<Self, ResolveError> {
        let api_base = config.resolved_api_base()?;
        let routes = PortalRoutes::compile(&config.name, &config.portal_host)?;
        let realm = config
            .auth_realm
            .clone()
            .unwrap_or_else(|| config.name.clone());
        let session = SessionContext::new(realm, api_base.clone(), credentials)
            .with_language(&config.language);
        let ranker = FormatRanker::new(config.rank_policy.clone());
        Ok(Self {
            config,
            api_base,
            routes,
            director,
            session,
            ranker,
            quality_ladder: QualityLadder::new(QUALITY_LABELS),
        })
    }

    fn provider(&self) -> &str {
        &self.config.name
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResolveError> {
        self.api_base.join(path).map_err(|e| {
            ResolveError::unexpected(self.provider(), &format!("bad endpoint '{path}': {e}"))
        })
    }

    /// Program details, newest API generation first.
    async fn fetch_details(
        &self,
        program_id: &str,
        session: &SessionInfo,
    ) -> Result<ProgramDetails, ResolveError> {
        let catalog_key = session.catalog_key.as_deref().unwrap_or("default");
        let v3 = self.endpoint(&format!("v3/programs/{catalog_key}/{program_id}"))?;
        let v1 = self.endpoint(&format!("v1/programs/{catalog_key}/{program_id}"))?;

        let candidates: Vec<BoxFuture<'_, Result<ProgramDetails, ResolveError>>> = vec![
            Box::pin(self.fetch_program_envelope(v3)),
            Box::pin(self.fetch_program_envelope(v1)),
        ];
        first_success("program-details", candidates).await
    }

    async fn fetch_program_envelope(&self, url: Url) -> Result<ProgramDetails, ResolveError> {
        let response = self.director.dispatch(&RequestSpec::get(url)).await?;
        let envelope: ProgramEnvelope = response.json()?;
        envelope.programs.into_iter().next().ok_or_else(|| {
            ResolveError::unexpected(self.provider(), "details payload has an empty programs array")
        })
    }

    /// Asks the watch endpoint for one technology's manifest URLs.
    async fn watch_sources(
        &self,
        path: &str,
        tech: StreamTechnology,
    ) -> Result<(Vec<AssetSource>, Option<ChannelSummary>), ResolveError> {
        let spec = RequestSpec::post(self.endpoint(path)?).with_form(&[
            ("stream_type", tech.token()),
            ("https_watch_urls", "true"),
        ]);
        let response = self.director.dispatch(&spec).await?;
        let envelope: WatchEnvelope = response.json()?;

        let mut sources = Vec::new();
        for watch_url in envelope.stream.watch_urls {
            let url = Url::parse(&watch_url.url).map_err(|e| {
                ResolveError::unexpected(self.provider(), &format!("bad watch url: {e}"))
            })?;
            let prefix = join_format_id(&[
                Some(tech.token()),
                watch_url.quality.as_deref(),
                watch_url.audio_channel.as_deref(),
            ]);
            sources.push(AssetSource::remote(url, prefix).with_family(tech.family()));
        }
        Ok((sources, envelope.channel))
    }

    /// Progressive streams the API describes directly, ranked by their
    /// quality label.
    fn merge_direct_streams(&self, catalog: &mut FormatCatalog, streams: Vec<ApiStream>) {
        let mut formats = Vec::new();
        for stream in streams {
            match Url::parse(&stream.url) {
                Ok(url) => {
                    let format_id = join_format_id(&[Some("http"), stream.quality.as_deref()]);
                    let mut format = FormatDescriptor::new(format_id, url, Protocol::DirectHttp);
                    format.ext = Some(Protocol::DirectHttp.default_ext().to_string());
                    format.quality = stream
                        .quality
                        .as_deref()
                        .and_then(|label| self.quality_ladder.rank(label));
                    format.language = stream.language;
                    formats.push(format);
                }
                Err(e) => catalog.record_failure(ResolveError::unexpected(
                    self.provider(),
                    &format!("bad direct stream url '{}': {e}", stream.url),
                )),
            }
        }
        catalog.add_formats(formats);
    }

    #[tracing::instrument(skip(self, session), fields(provider = %self.config.name))]
    async fn resolve_program(
        &self,
        channel: &str,
        program_id: &str,
        session: &SessionInfo,
    ) -> Result<MediaResult, ResolveError> {
        let ProgramDetails {
            title,
            description,
            duration,
            start,
            channel_id,
            channel_title,
            availability,
            external_url,
            streams,
            subtitles,
        } = self.fetch_details(program_id, session).await?;

        match availability.as_deref() {
            Some(AVAILABILITY_GEO_BLOCKED) => {
                return Err(ResolveError::geo_restricted(
                    self.provider(),
                    session.region.as_deref(),
                ));
            }
            Some(AVAILABILITY_SUBSCRIPTION) => {
                return Err(ResolveError::paid_content(
                    program_id,
                    "only available with an active subscription",
                ));
            }
            _ => {}
        }

        if let Some(external) = &external_url {
            let url = Url::parse(external).map_err(|e| {
                ResolveError::unexpected(self.provider(), &format!("bad external url: {e}"))
            })?;
            debug!(%url, "program hosted externally, redirecting");
            return Ok(MediaResult::Redirect(RedirectTarget::with_metadata(
                url,
                Some(program_id),
                title.as_deref(),
            )));
        }

        let mut catalog = FormatCatalog::new(program_id);
        self.merge_direct_streams(&mut catalog, streams);
        catalog.merge_subtitles(side_channel_subtitles(subtitles));

        let watch_channel = channel_id.as_deref().unwrap_or(channel);
        let mut sources = Vec::new();
        for tech in &self.config.technologies {
            let path = format!("v2/watch/{watch_channel}/{program_id}");
            match self.watch_sources(&path, *tech).await {
                Ok((tech_sources, _)) => sources.extend(tech_sources),
                Err(error) => catalog.record_failure(error),
            }
        }
        catalog
            .collect_concurrent(&self.director, sources, self.config.manifest_concurrency)
            .await?;

        let (mut formats, subtitles) = catalog.finish()?;
        self.ranker.sort(&mut formats);

        let mut entry = MediaEntry::new(program_id, title.unwrap_or_default());
        entry.description = description;
        entry.duration = duration;
        entry.timestamp = start;
        entry.uploader = channel_title;
        entry.uploader_id = channel_id;
        entry.formats = formats;
        entry.subtitles = subtitles;
        Ok(MediaResult::from_entry(entry))
    }

    #[tracing::instrument(skip(self), fields(provider = %self.config.name))]
    async fn resolve_live(&self, channel: &str) -> Result<MediaResult, ResolveError> {
        let mut catalog = FormatCatalog::new(channel);
        let mut channel_title: Option<String> = None;

        let mut sources = Vec::new();
        for tech in &self.config.technologies {
            let path = format!("v2/watch/live/{channel}");
            match self.watch_sources(&path, *tech).await {
                Ok((tech_sources, summary)) => {
                    sources.extend(tech_sources);
                    if channel_title.is_none() {
                        channel_title = summary.and_then(|c| c.title);
                    }
                }
                Err(error) => catalog.record_failure(error),
            }
        }
        catalog
            .collect_concurrent(&self.director, sources, self.config.manifest_concurrency)
            .await?;

        let (mut formats, subtitles) = catalog.finish()?;
        self.ranker.sort(&mut formats);

        let mut entry = MediaEntry::new(
            channel,
            channel_title.unwrap_or_else(|| channel.to_string()),
        );
        entry.formats = formats;
        entry.subtitles = subtitles;
        Ok(MediaResult::from_entry(entry))
    }

    fn resolve_series(&self, series_id: &str) -> MediaResult {
        let pager = EpisodePager {
            director: Arc::clone(&self.director),
            api_base: self.api_base.clone(),
            portal_host: self.config.portal_host.clone(),
            provider: self.config.name.clone(),
            series_id: series_id.to_string(),
            total_pages: OnceLock::new(),
        };
        MediaResult::Playlist(Playlist::new(
            series_id,
            LazyEntries::new(Arc::new(pager)),
        ))
    }
}

#[async_trait]
impl SiteExtractor for PlatformExtractor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn suitable(&self, url: &Url) -> bool {
        self.routes.classify(url).is_some()
    }

    async fn resolve(&self, url: &Url) -> Result<MediaResult, ResolveError> {
        let Some(route) = self.routes.classify(url) else {
            return Err(ResolveError::unsupported_url(url.as_str()));
        };

        // Every portal URL kind sits behind the account wall.
        let session = self.session.initialize(&self.director).await?;

        match route {
            Route::Program { channel, id } => {
                self.resolve_program(&channel, &id, &session).await
            }
            Route::Live { channel } => self.resolve_live(&channel).await,
            Route::Series { id } => Ok(self.resolve_series(&id)),
        }
    }
}

impl std::fmt::Debug for PlatformExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformExtractor")
            .field("provider", &self.config.name)
            .field("portal_host", &self.config.portal_host)
            .finish_non_exhaustive()
    }
}

fn side_channel_subtitles(subtitles: Vec<ApiSubtitle>) -> SubtitleMap {
    let mut map = SubtitleMap::new();
    for subtitle in subtitles {
        let Ok(url) = Url::parse(&subtitle.url) else {
            warn!(url = %subtitle.url, "skipping caption track with unparseable url");
            continue;
        };
        let lang = subtitle.language.unwrap_or_else(|| "und".to_string());
        let mut track = SubtitleTrack::new(url);
        track.ext = subtitle.format;
        add_subtitle_track(&mut map, &lang, track);
    }
    map
}

/// Page source over the portal's episode listing.
struct EpisodePager {
    director: Arc<RequestDirector>,
    api_base: Url,
    portal_host: String,
    provider: String,
    series_id: String,
    /// Learned from the first envelope that reports a total, or from a
    /// short page; lets the cursor stop without probing past the end.
    total_pages: OnceLock<usize>,
}

impl EpisodePager {
    fn episode_entry(&self, episode: &EpisodeSummary) -> Option<MediaResult> {
        let channel = episode.channel_id.as_deref()?;
        let url = Url::parse(&format!(
            "https://{}/watch/{}/{}",
            self.portal_host, channel, episode.id
        ))
        .ok()?;
        Some(MediaResult::Redirect(RedirectTarget::with_metadata(
            url,
            Some(&episode.id.to_string()),
            episode.title.as_deref(),
        )))
    }
}

#[async_trait]
impl EntrySource for EpisodePager {
    async fn page(&self, index: usize) -> Result<Option<Vec<MediaResult>>, ResolveError> {
        if let Some(&pages) = self.total_pages.get() {
            if index >= pages {
                return Ok(None);
            }
        }

        let url = self
            .api_base
            .join(&format!("v1/series/{}/episodes", self.series_id))
            .map_err(|e| {
                ResolveError::unexpected(&self.provider, &format!("bad episodes endpoint: {e}"))
            })?;
        let spec = RequestSpec::get(url)
            .with_query("page", &index.to_string())
            .with_query("page_size", &PAGE_SIZE.to_string());
        let response = self.director.dispatch(&spec).await?;
        let envelope: EpisodesEnvelope = response.json()?;

        if envelope.episodes.is_empty() {
            return Ok(None);
        }
        if let Some(total) = envelope.total {
            let pages = usize::try_from(total).unwrap_or(usize::MAX).div_ceil(PAGE_SIZE);
            let _ = self.total_pages.set(pages);
        } else if envelope.episodes.len() < PAGE_SIZE {
            // A short page is the last page when the portal omits the total.
            let _ = self.total_pages.set(index + 1);
        }

        let entries: Vec<MediaResult> = envelope
            .episodes
            .iter()
            .filter_map(|episode| self.episode_entry(episode))
            .collect();
        debug!(
            series_id = %self.series_id,
            page = index,
            entries = entries.len(),
            "episode page fetched"
        );
        Ok(Some(entries))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn extractor() -> PlatformExtractor {
        PlatformExtractor::new(
            ProviderConfig::new("streamhub", "watch.streamhub.test"),
            Arc::new(RequestDirector::new()),
            None,
        )
        .unwrap()
    }

    fn url(u: &str) -> Url {
        Url::parse(u).unwrap()
    }

    // ==================== Routing Tests ====================

    #[test]
    fn test_program_route() {
        let ex = extractor();
        let route = ex
            .routes
            .classify(&url("https://watch.streamhub.test/watch/arte/120534"))
            .unwrap();
        assert_eq!(
            route,
            Route::Program {
                channel: "arte".to_string(),
                id: "120534".to_string()
            }
        );
    }

    #[test]
    fn test_program_route_accepts_www_and_suffix() {
        let ex = extractor();
        let route = ex
            .routes
            .classify(&url(
                "https://www.watch.streamhub.test/watch/arte/120534/some-title",
            ))
            .unwrap();
        assert!(matches!(route, Route::Program { .. }));
    }

    #[test]
    fn test_live_route() {
        let ex = extractor();
        let route = ex
            .routes
            .classify(&url("https://watch.streamhub.test/live/zdf"))
            .unwrap();
        assert_eq!(
            route,
            Route::Live {
                channel: "zdf".to_string()
            }
        );
    }

    #[test]
    fn test_series_route() {
        let ex = extractor();
        let route = ex
            .routes
            .classify(&url("https://watch.streamhub.test/series/4821"))
            .unwrap();
        assert_eq!(
            route,
            Route::Series {
                id: "4821".to_string()
            }
        );
    }

    #[test]
    fn test_foreign_host_not_suitable() {
        let ex = extractor();
        assert!(!ex.suitable(&url("https://other.example.com/watch/arte/120534")));
        assert!(!ex.suitable(&url("https://watch.streamhub.test/about")));
    }

    #[test]
    fn test_escaped_host_does_not_match_lookalike() {
        let ex = extractor();
        // The dot in the host must not act as a regex wildcard.
        assert!(!ex.suitable(&url("https://watchXstreamhub.test/watch/arte/1")));
    }

    // ==================== Technology Tests ====================

    #[test]
    fn test_technology_tokens_and_families() {
        assert_eq!(StreamTechnology::Dash.token(), "dash");
        assert_eq!(StreamTechnology::Hls.family(), ManifestFamily::Hls);
        assert_eq!(StreamTechnology::Ism.family(), ManifestFamily::Ism);
    }

    // ==================== Payload Mapping Tests ====================

    #[test]
    fn test_direct_streams_use_quality_ladder() {
        let ex = extractor();
        let mut catalog = FormatCatalog::new("p1");
        ex.merge_direct_streams(
            &mut catalog,
            vec![
                ApiStream {
                    url: "https://cdn.streamhub.test/p1-sd.mp4".to_string(),
                    quality: Some("sd".to_string()),
                    language: None,
                },
                ApiStream {
                    url: "https://cdn.streamhub.test/p1-hd.mp4".to_string(),
                    quality: Some("hd".to_string()),
                    language: Some("de".to_string()),
                },
            ],
        );

        let (formats, _) = catalog.finish().unwrap();
        assert_eq!(formats[0].format_id, "http-sd");
        assert!(formats[0].quality.unwrap() < formats[1].quality.unwrap());
        assert_eq!(formats[1].language.as_deref(), Some("de"));
    }

    #[test]
    fn test_unknown_quality_label_stays_unranked() {
        let ex = extractor();
        let mut catalog = FormatCatalog::new("p1");
        ex.merge_direct_streams(
            &mut catalog,
            vec![ApiStream {
                url: "https://cdn.streamhub.test/p1.mp4".to_string(),
                quality: Some("4k-ultra".to_string()),
                language: None,
            }],
        );
        let (formats, _) = catalog.finish().unwrap();
        assert_eq!(formats[0].quality, None);
    }

    #[test]
    fn test_side_channel_subtitles_default_language() {
        let map = side_channel_subtitles(vec![
            ApiSubtitle {
                url: "https://cdn.streamhub.test/cc-de.vtt".to_string(),
                language: Some("de".to_string()),
                format: Some("vtt".to_string()),
            },
            ApiSubtitle {
                url: "https://cdn.streamhub.test/cc.srt".to_string(),
                language: None,
                format: None,
            },
            ApiSubtitle {
                url: "not a url".to_string(),
                language: Some("fr".to_string()),
                format: None,
            },
        ]);

        assert_eq!(map["de"][0].ext.as_deref(), Some("vtt"));
        assert_eq!(map["und"].len(), 1);
        assert!(!map.contains_key("fr"), "unparseable url dropped");
    }

    // ==================== Pager Tests ====================

    #[test]
    fn test_episode_entry_builds_portal_url() {
        let pager = EpisodePager {
            director: Arc::new(RequestDirector::new()),
            api_base: url("https://watch.streamhub.test/api/"),
            portal_host: "watch.streamhub.test".to_string(),
            provider: "streamhub".to_string(),
            series_id: "4821".to_string(),
            total_pages: OnceLock::new(),
        };
        let entry = pager
            .episode_entry(&EpisodeSummary {
                id: 99,
                title: Some("Pilot".to_string()),
                channel_id: Some("arte".to_string()),
            })
            .unwrap();

        let MediaResult::Redirect(target) = entry else {
            panic!("expected redirect");
        };
        assert_eq!(
            target.url.as_str(),
            "https://watch.streamhub.test/watch/arte/99"
        );
        assert_eq!(target.title.as_deref(), Some("Pilot"));
    }

    #[test]
    fn test_episode_without_channel_skipped() {
        let pager = EpisodePager {
            director: Arc::new(RequestDirector::new()),
            api_base: url("https://watch.streamhub.test/api/"),
            portal_host: "watch.streamhub.test".to_string(),
            provider: "streamhub".to_string(),
            series_id: "4821".to_string(),
            total_pages: OnceLock::new(),
        };
        assert!(
            pager
                .episode_entry(&EpisodeSummary {
                    id: 99,
                    title: None,
                    channel_id: None,
                })
                .is_none()
        );
    }
}
