//! Web crawl loop
//!
//! Drives the recursive, single-page, sitemap and URL-list modes:
//! - expanding the seed into the initial frontier
//! - validating, fetching and extracting each URL
//! - following same-origin links (recursive mode only)
//! - handing full batches downstream as they fill

use crate::config::{Config, CrawlConfig, CrawlMode, FetchConfig};
use crate::crawler::batcher::{assert_progress, DocumentBatcher};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::pagination::fetch_sitemap;
use crate::crawler::parser::discover_links;
use crate::crawler::session::{build_renderer, FetchError, FetchSession};
use crate::crawler::{BatchStream, Connector};
use crate::document::{Document, DocumentSource};
use crate::extract::{ContentExtractor, PageContent};
use crate::guard::SsrfGuard;
use crate::state::{CrawlState, PageError, PageErrorKind};
use crate::url::{parse_seed, read_url_list, same_origin};
use crate::{Result, SieveError};
use async_stream::try_stream;
use futures::Stream;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Connector for the generic web crawl modes
pub struct WebConnector {
    crawl: CrawlConfig,
    fetch: FetchConfig,
    guard: SsrfGuard,
    client: Client,
    extractor: ContentExtractor,
    cancel: Option<CancellationToken>,
}

impl WebConnector {
    pub fn new(config: &Config, cancel: Option<CancellationToken>) -> Result<Self> {
        let guard = SsrfGuard::new(config.crawl.enforce_ssrf_guard);
        let client = build_http_client(&config.fetch, guard)?;
        Ok(Self {
            crawl: config.crawl.clone(),
            fetch: config.fetch.clone(),
            guard,
            client,
            extractor: ContentExtractor::from_config(&config.crawl),
            cancel,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }

    /// Returns the initial frontier for the configured mode
    ///
    /// A sitemap that cannot be fetched is recorded as a page failure and
    /// yields no seeds; an unreadable URL list is an error.
    async fn seed_urls(&self, state: &mut CrawlState) -> Result<Vec<String>> {
        match self.crawl.mode {
            CrawlMode::UrlList => Ok(read_url_list(Path::new(&self.crawl.seed_url))?),
            CrawlMode::Sitemap => {
                let sitemap = parse_seed(&self.crawl.seed_url)?;
                match fetch_sitemap(&self.client, &self.guard, &sitemap).await {
                    Ok(urls) => Ok(urls),
                    Err(error) => {
                        state.record_failure(&error);
                        Ok(Vec::new())
                    }
                }
            }
            _ => Ok(vec![parse_seed(&self.crawl.seed_url)?.to_string()]),
        }
    }

    fn crawl(self) -> impl Stream<Item = Result<Vec<Document>>> + Send {
        try_stream! {
            let mut state = CrawlState::new();
            for seed in self.seed_urls(&mut state).await? {
                state.frontier.push(seed);
            }

            let origin = if self.crawl.mode.follows_links() {
                Some(parse_seed(&self.crawl.seed_url)?)
            } else {
                None
            };

            let renderer = build_renderer(&self.fetch, self.client.clone())?;
            let mut session = FetchSession::new(
                renderer,
                self.client.clone(),
                self.guard,
                Duration::from_secs(self.fetch.navigation_timeout_secs),
            );
            let mut batcher = DocumentBatcher::new(self.crawl.batch_size);
            let mut cancelled = false;
            let mut processed: u64 = 0;

            tracing::info!(
                "Starting {} crawl from {} ({} seeds)",
                self.crawl.mode,
                self.crawl.seed_url,
                state.frontier.pending_len()
            );

            while let Some(current) = state.frontier.pop() {
                if self.is_cancelled() {
                    tracing::info!("Crawl cancelled, {} URLs left unvisited", state.frontier.pending_len() + 1);
                    cancelled = true;
                    break;
                }
                if !state.frontier.mark_visited(&current) {
                    continue;
                }

                match self.visit(&mut session, &mut state, &current, origin.as_ref()).await {
                    Ok(Some(document)) => batcher.add(document),
                    Ok(None) => {}
                    Err(FetchError::Page(error)) => state.record_failure(&error),
                    Err(FetchError::Launch(error)) => {
                        tracing::error!("Rendering session could not be started: {}", error);
                        Err::<(), SieveError>(error)?;
                    }
                }

                processed += 1;
                if processed % 10 == 0 {
                    tracing::info!(
                        "Progress: {} URLs processed, {} pending, {} documents emitted",
                        processed,
                        state.frontier.pending_len(),
                        state.documents_emitted
                    );
                }

                if let Some(batch) = batcher.flush_if_full() {
                    session.release().await;
                    state.record_emitted(batch.len());
                    yield batch;
                }
            }

            tracing::debug!(
                "Rendering session launched {} times, last state {}",
                session.launches(),
                session.state()
            );
            session.release().await;
            if let Some(batch) = batcher.final_flush() {
                state.record_emitted(batch.len());
                yield batch;
            }

            tracing::info!(
                "Crawl finished: {} pages fetched, {} documents emitted, {} URLs skipped",
                state.pages_visited,
                state.documents_emitted,
                state.failure_count()
            );
            if state.failure_count() > 0 {
                tracing::debug!("Skipped by kind: {}", state.failure_breakdown());
            }

            if !cancelled {
                assert_progress(&state)?;
            }
        }
    }

    /// Visits one URL and returns its document
    ///
    /// `Ok(None)` means the fetch was redirected to a URL that was already
    /// visited.
    async fn visit(
        &self,
        session: &mut FetchSession,
        state: &mut CrawlState,
        current: &str,
        origin: Option<&Url>,
    ) -> std::result::Result<Option<Document>, FetchError> {
        let url = Url::parse(current)
            .map_err(|e| PageError::new(current, PageErrorKind::UrlValidation, e.to_string()))?;
        self.guard
            .validate(&url)
            .await
            .map_err(|e| PageError::from_guard(current, e))?;

        tracing::info!("Visiting {}", current);
        state.pages_visited += 1;
        let fetched = session.fetch(&url).await?;

        let page_url = fetched.final_url.clone();
        if fetched.redirected() {
            tracing::info!("Redirected to {}", page_url);
            if !state.frontier.mark_visited(page_url.as_str()) {
                tracing::info!("Redirected page already indexed: {}", page_url);
                return Ok(None);
            }
        }

        // Links are collected even from error pages
        if let (Some(origin), PageContent::Html(html)) = (origin, &fetched.content) {
            if !current.contains('#') && same_origin(origin, &page_url) {
                for link in discover_links(html, &page_url, origin, self.crawl.strip_fragments) {
                    state.frontier.push(link);
                }
            }
        }

        if let Some(status) = fetched.status.filter(|_| fetched.is_error_status()) {
            return Err(PageError::http_status(page_url.as_str(), status).into());
        }

        let extracted = self
            .extractor
            .extract(&fetched.content)
            .map_err(|e| PageError::extraction(page_url.as_str(), e))?;

        let semantic_identifier = match fetched.content {
            PageContent::Pdf(_) => file_name(&page_url),
            PageContent::Html(_) => extracted
                .title
                .unwrap_or_else(|| page_url.to_string()),
        };

        Ok(Some(Document::single_section(
            page_url.as_str(),
            page_url.as_str(),
            extracted.cleaned_text,
            DocumentSource::Web,
            semantic_identifier,
        )))
    }
}

/// Last non-empty path segment, or the whole URL
fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(String::from)
        .unwrap_or_else(|| url.to_string())
}

impl Connector for WebConnector {
    fn name(&self) -> &'static str {
        "web"
    }

    fn produce(self: Box<Self>) -> BatchStream {
        Box::pin((*self).crawl())
    }
}
