//! Lazy playlist entries: children are resolved only when the consumer
//! asks for them.
//!
//! A [`LazyEntries`] value is just a handle on an [`EntrySource`]; walking
//! it goes through an [`EntryCursor`], which pulls one page at a time.
//! Dropping the cursor stops all further network dispatch (the model is
//! pull-based, so cancellation is simply ceasing to pull), and a fresh
//! cursor restarts from the first page, re-issuing the underlying calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::MediaResult;
use crate::error::ResolveError;

/// Produces playlist pages on demand.
///
/// `page` is zero-based; `Ok(None)` signals exhaustion. Sources are shared
/// between cursors, so implementations keep per-iteration state out of
/// `&self`.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Fetches page `index`, or `None` when pagination is exhausted.
    async fn page(&self, index: usize) -> Result<Option<Vec<MediaResult>>, ResolveError>;
}

/// Fully materialized source: one page holding pre-built entries.
struct FixedEntries {
    entries: Vec<MediaResult>,
}

#[async_trait]
impl EntrySource for FixedEntries {
    async fn page(&self, index: usize) -> Result<Option<Vec<MediaResult>>, ResolveError> {
        if index == 0 && !self.entries.is_empty() {
            Ok(Some(self.entries.clone()))
        } else {
            Ok(None)
        }
    }
}

/// A re-iterable, lazily produced sequence of child results.
#[derive(Clone)]
pub struct LazyEntries {
    source: Arc<dyn EntrySource>,
}

impl LazyEntries {
    /// Wraps a page source.
    #[must_use]
    pub fn new(source: Arc<dyn EntrySource>) -> Self {
        Self { source }
    }

    /// Builds a sequence over already-known entries (single page, no I/O).
    #[must_use]
    pub fn from_entries(entries: Vec<MediaResult>) -> Self {
        Self::new(Arc::new(FixedEntries { entries }))
    }

    /// Starts a fresh iteration from the first page.
    #[must_use]
    pub fn cursor(&self) -> EntryCursor {
        EntryCursor {
            source: Arc::clone(&self.source),
            next_page: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Drains the whole sequence. Convenience for consumers that want
    /// everything anyway; bounded by the source's own pagination.
    ///
    /// # Errors
    ///
    /// Propagates the first page fetch failure.
    pub async fn collect_all(&self) -> Result<Vec<MediaResult>, ResolveError> {
        let mut cursor = self.cursor();
        let mut all = Vec::new();
        while let Some(entry) = cursor.next_entry().await? {
            all.push(entry);
        }
        Ok(all)
    }
}

impl std::fmt::Debug for LazyEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEntries").finish_non_exhaustive()
    }
}

/// One walk over a [`LazyEntries`] sequence.
pub struct EntryCursor {
    source: Arc<dyn EntrySource>,
    next_page: usize,
    buffer: VecDeque<MediaResult>,
    exhausted: bool,
}

impl EntryCursor {
    /// Next child, fetching the next page when the buffer runs dry.
    ///
    /// Returns `Ok(None)` once the source is exhausted; after that it stays
    /// exhausted and no further fetches happen.
    ///
    /// # Errors
    ///
    /// Propagates page fetch failures; the cursor stays usable and will
    /// retry the same page on the next call.
    pub async fn next_entry(&mut self) -> Result<Option<MediaResult>, ResolveError> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.source.page(self.next_page).await? {
                Some(entries) if entries.is_empty() => {
                    debug!(page = self.next_page, "empty page, sequence exhausted");
                    self.exhausted = true;
                }
                Some(entries) => {
                    debug!(page = self.next_page, count = entries.len(), "fetched playlist page");
                    self.next_page += 1;
                    self.buffer.extend(entries);
                }
                None => {
                    self.exhausted = true;
                }
            }
        }
    }

    /// Pulls up to `limit` children.
    ///
    /// # Errors
    ///
    /// Propagates the first page fetch failure.
    pub async fn take(&mut self, limit: usize) -> Result<Vec<MediaResult>, ResolveError> {
        let mut taken = Vec::with_capacity(limit);
        while taken.len() < limit {
            match self.next_entry().await? {
                Some(entry) => taken.push(entry),
                None => break,
            }
        }
        Ok(taken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::media::RedirectTarget;

    /// Source producing `pages` pages of `per_page` redirects, counting
    /// how many pages were actually fetched.
    struct CountingSource {
        pages: usize,
        per_page: usize,
        fetched: AtomicUsize,
    }

    impl CountingSource {
        fn new(pages: usize, per_page: usize) -> Self {
            Self {
                pages,
                per_page,
                fetched: AtomicUsize::new(0),
            }
        }

        fn entry(page: usize, slot: usize) -> MediaResult {
            let url = Url::parse(&format!("https://example.com/p/{page}-{slot}")).unwrap();
            MediaResult::Redirect(RedirectTarget::new(url))
        }
    }

    #[async_trait]
    impl EntrySource for CountingSource {
        async fn page(&self, index: usize) -> Result<Option<Vec<MediaResult>>, ResolveError> {
            if index >= self.pages {
                return Ok(None);
            }
            self.fetched.fetch_add(1, Ordering::SeqCst);
            Ok(Some(
                (0..self.per_page).map(|s| Self::entry(index, s)).collect(),
            ))
        }
    }

    #[tokio::test]
    async fn test_early_stop_fetches_only_needed_pages() {
        let source = Arc::new(CountingSource::new(10, 3));
        let entries = LazyEntries::new(Arc::clone(&source) as Arc<dyn EntrySource>);

        let mut cursor = entries.cursor();
        let taken = cursor.take(2).await.unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(source.fetched.load(Ordering::SeqCst), 1, "one page suffices");

        drop(cursor);
        assert_eq!(source.fetched.load(Ordering::SeqCst), 1, "drop stops dispatch");
    }

    #[tokio::test]
    async fn test_reiteration_reissues_calls() {
        let source = Arc::new(CountingSource::new(2, 2));
        let entries = LazyEntries::new(Arc::clone(&source) as Arc<dyn EntrySource>);

        let first = entries.collect_all().await.unwrap();
        let second = entries.collect_all().await.unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        assert_eq!(
            source.fetched.load(Ordering::SeqCst),
            4,
            "two walks fetch every page twice"
        );
    }

    #[tokio::test]
    async fn test_exhaustion_is_sticky() {
        let source = Arc::new(CountingSource::new(1, 1));
        let entries = LazyEntries::new(source as Arc<dyn EntrySource>);

        let mut cursor = entries.cursor();
        assert!(cursor.next_entry().await.unwrap().is_some());
        assert!(cursor.next_entry().await.unwrap().is_none());
        assert!(cursor.next_entry().await.unwrap().is_none());
    }

    #[test]
    fn test_from_entries_single_page() {
        let url = Url::parse("https://example.com/only").unwrap();
        let entries =
            LazyEntries::from_entries(vec![MediaResult::Redirect(RedirectTarget::new(url))]);
        let all = tokio_test::block_on(entries.collect_all()).unwrap();
        assert_eq!(all.len(), 1);
    }
}
