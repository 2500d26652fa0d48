//! Site extractors and the registry that routes URLs to them.
//!
//! # Architecture
//!
//! - [`SiteExtractor`] - the provider contract: a URL predicate plus an
//!   async resolve into a [`MediaResult`]
//! - [`ExtractorRegistry`] - built once at startup; picks the first
//!   suitable extractor and follows transparent redirects, re-entering
//!   itself so a redirect may land on a different provider
//! - [`platform::PlatformExtractor`] - the shipped portal implementation
//! - [`fallback::first_success`] - ordered fallback over endpoint variants
//!
//! The registry never falls through to a second extractor when the first
//! suitable one fails: extractor choice is a routing decision, failures
//! are outcomes.

pub mod fallback;
pub mod platform;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::error::ResolveError;
use crate::media::{MediaResult, RedirectTarget};

/// Redirect hops the registry follows before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// One site's resolution recipe.
#[async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Stable name for logs and error context.
    fn name(&self) -> &str;

    /// True when this extractor understands the URL.
    fn suitable(&self, url: &Url) -> bool;

    /// Resolves the URL into media, a playlist, or a redirect.
    async fn resolve(&self, url: &Url) -> Result<MediaResult, ResolveError>;
}

/// Metadata collected along a redirect chain. The earliest hop that states
/// a field wins; the terminal result only takes values for fields it left
/// unset.
#[derive(Debug, Default)]
struct InheritedMetadata {
    id: Option<String>,
    title: Option<String>,
}

impl InheritedMetadata {
    fn absorb(&mut self, target: &RedirectTarget) {
        if self.id.is_none() {
            self.id.clone_from(&target.id);
        }
        if self.title.is_none() {
            self.title.clone_from(&target.title);
        }
    }

    fn apply(self, result: MediaResult) -> MediaResult {
        match result {
            MediaResult::Media(mut entry) => {
                if entry.id.is_empty() {
                    if let Some(id) = self.id {
                        entry.id = id;
                    }
                }
                if entry.title.is_empty() {
                    if let Some(title) = self.title {
                        entry.title = title;
                    }
                }
                MediaResult::Media(entry)
            }
            MediaResult::Playlist(mut playlist) => {
                if playlist.title.is_none() {
                    playlist.title = self.title;
                }
                MediaResult::Playlist(playlist)
            }
            MediaResult::Redirect(target) => MediaResult::Redirect(target),
        }
    }
}

/// Explicit extractor registry, read-only once resolution starts.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn SiteExtractor>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registers an extractor. Earlier registrations win URL-match ties.
    pub fn register(&mut self, extractor: Arc<dyn SiteExtractor>) {
        debug!(extractor = extractor.name(), "registered extractor");
        self.extractors.push(extractor);
    }

    /// Names of registered extractors, in consultation order.
    #[must_use]
    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    fn suitable_extractor(&self, url: &Url) -> Option<&Arc<dyn SiteExtractor>> {
        self.extractors.iter().find(|e| e.suitable(url))
    }

    /// Resolves a URL via the first suitable extractor, following
    /// transparent redirects (which may switch providers) and merging
    /// inheritable redirect metadata into the terminal result.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnsupportedUrl`] when no extractor matches,
    /// [`ResolveError::TooManyRedirects`] past the hop limit, and whatever
    /// the chosen extractor itself raises.
    #[tracing::instrument(skip(self), fields(url = %url))]
    pub async fn resolve(&self, url: &Url) -> Result<MediaResult, ResolveError> {
        let mut current = url.clone();
        let mut inherited = InheritedMetadata::default();
        let mut redirect_count: usize = 0;

        loop {
            let Some(extractor) = self.suitable_extractor(&current) else {
                return Err(ResolveError::unsupported_url(current.as_str()));
            };

            debug!(extractor = extractor.name(), url = %current, "trying extractor");
            match extractor.resolve(&current).await? {
                MediaResult::Redirect(target) => {
                    redirect_count += 1;
                    if redirect_count > MAX_REDIRECTS {
                        return Err(ResolveError::too_many_redirects(
                            url.as_str(),
                            redirect_count,
                        ));
                    }
                    debug!(
                        extractor = extractor.name(),
                        from = %current,
                        to = %target.url,
                        redirect_count,
                        "following transparent redirect"
                    );
                    inherited.absorb(&target);
                    current = target.url.clone();
                }
                terminal => {
                    info!(extractor = extractor.name(), "resolution successful");
                    return Ok(inherited.apply(terminal));
                }
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.extractor_names())
            .finish()
    }
}
