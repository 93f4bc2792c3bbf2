//! Forum board and thread harvesting
//!
//! Board mode walks every listing page of a board, collects the thread links
//! on each, then walks every page of every thread. Thread mode walks the
//! pages of a single thread. Each post becomes one document; on incremental
//! runs posts not newer than the sync marker are dropped.

use crate::config::{Config, CrawlMode, ForumConfig};
use crate::crawler::batcher::{assert_progress, DocumentBatcher};
use crate::crawler::fetcher::{build_http_client, fetch_text};
use crate::crawler::pagination::{numbered_pages, page_count};
use crate::crawler::parser::DomNode;
use crate::crawler::{BatchStream, Connector};
use crate::document::{Document, DocumentSource};
use crate::extract::normalize_text;
use crate::guard::SsrfGuard;
use crate::state::{CrawlState, PageError, PageErrorKind, SyncMarker};
use crate::url::{canonical_forum_url, resolve_link};
use crate::{ConfigError, Result};
use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Characters that may not appear in a thread title
const TITLE_FORBIDDEN: &[char] = &[';', ':', '!', '*', '/', '\\', '?', '"', '<', '>', '|'];

/// Compiled forum selectors
#[derive(Debug, Clone)]
pub struct ForumSelectors {
    page_nav: Selector,
    thread_title: Selector,
    title: Selector,
    post: Selector,
    post_body: Selector,
    anchor: Selector,
    timestamp: Selector,
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        ConfigError::Validation(format!("invalid selector '{}': {:?}", css, e)).into()
    })
}

impl ForumSelectors {
    pub fn compile(config: &ForumConfig) -> Result<Self> {
        Ok(Self {
            page_nav: compile(&config.page_nav_selector)?,
            thread_title: compile(&config.thread_title_selector)?,
            title: compile(&config.title_selector)?,
            post: compile(&config.post_selector)?,
            post_body: compile(&config.post_body_selector)?,
            anchor: compile("a[href]")?,
            timestamp: compile("time[datetime]")?,
        })
    }
}

/// One post scraped from a thread page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumPost {
    /// Stable in-page identifier (`data-content` or `id`), if the markup has one
    pub anchor: Option<String>,
    /// Publication time, if present and parseable
    pub posted_at: Option<DateTime<Utc>>,
    /// Cleaned body text
    pub text: String,
}

/// Everything read from one thread page
#[derive(Debug, Clone, Default)]
pub struct ThreadPage {
    pub title: Option<String>,
    pub page_count: u32,
    pub posts: Vec<ForumPost>,
}

/// Replaces characters that are unsafe in titles with `_`
pub fn sanitize_title(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if TITLE_FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}

/// Parses a post timestamp (`2024-03-01T12:00:00+0000` or RFC 3339)
pub fn parse_post_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Returns thread URLs linked from a board listing page, in order
///
/// Only links containing `threads/` count. Anything after the last `/`
/// (unread markers, page suffixes) is dropped.
pub fn thread_links<N: DomNode>(root: &N, listing_url: &Url, selectors: &ForumSelectors) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut threads = Vec::new();

    for container in root.children(&selectors.thread_title) {
        for anchor in container.children(&selectors.anchor) {
            let Some(href) = anchor.attribute("href") else {
                continue;
            };
            if !href.contains("threads/") {
                continue;
            }
            let trimmed = match href.rfind('/') {
                Some(slash) => &href[..=slash],
                None => href,
            };
            if let Some(url) = resolve_link(trimmed, listing_url, true) {
                let url = url.to_string();
                if seen.insert(url.clone()) {
                    threads.push(url);
                }
            }
        }
    }

    threads
}

/// Scrapes the title, page count and posts of a thread page
pub fn scrape_thread<N: DomNode>(root: &N, selectors: &ForumSelectors) -> ThreadPage {
    let title = root
        .first_child(&selectors.title)
        .map(|node| sanitize_title(&node.text()))
        .filter(|title| !title.is_empty());

    let posts = root
        .children(&selectors.post)
        .iter()
        .map(|post| {
            let anchor = post
                .attribute("data-content")
                .or_else(|| post.attribute("id"))
                .map(String::from);
            let posted_at = post
                .first_child(&selectors.timestamp)
                .and_then(|time| time.attribute("datetime").and_then(parse_post_time));
            let text = match post.first_child(&selectors.post_body) {
                Some(body) => normalize_text(&body.text()),
                None => normalize_text(&post.text()),
            };
            ForumPost {
                anchor,
                posted_at,
                text,
            }
        })
        .collect();

    ThreadPage {
        title,
        page_count: page_count(root, &selectors.page_nav),
        posts,
    }
}

/// Connector for the `forum-board` and `forum-thread` modes
pub struct ForumConnector {
    mode: CrawlMode,
    base_url: String,
    batch_size: usize,
    selectors: ForumSelectors,
    guard: SsrfGuard,
    client: Client,
    marker: SyncMarker,
    started_at: DateTime<Utc>,
    cancel: Option<CancellationToken>,
}

impl ForumConnector {
    pub fn new(
        config: &Config,
        marker: SyncMarker,
        cancel: Option<CancellationToken>,
    ) -> Result<Self> {
        let guard = SsrfGuard::new(config.crawl.enforce_ssrf_guard);
        Ok(Self {
            mode: config.crawl.mode,
            base_url: canonical_forum_url(&config.crawl.seed_url),
            batch_size: config.crawl.batch_size,
            selectors: ForumSelectors::compile(&config.forum)?,
            guard,
            client: build_http_client(&config.fetch, guard)?,
            marker,
            started_at: Utc::now(),
            cancel,
        })
    }

    /// Canonical board or thread URL the crawl starts from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }

    /// Fetches one forum page, recording failures in `state`
    async fn fetch_page(&self, state: &mut CrawlState, page_url: &str) -> Option<String> {
        match self.try_fetch_page(page_url).await {
            Ok(body) => {
                state.pages_visited += 1;
                Some(body)
            }
            Err(error) => {
                state.record_failure(&error);
                None
            }
        }
    }

    async fn try_fetch_page(&self, page_url: &str) -> std::result::Result<String, PageError> {
        let url = Url::parse(page_url)
            .map_err(|e| PageError::new(page_url, PageErrorKind::UrlValidation, e.to_string()))?;
        self.guard
            .validate(&url)
            .await
            .map_err(|e| PageError::from_guard(page_url, e))?;

        tracing::info!("Fetching {}", page_url);
        let response = fetch_text(&self.client, &url).await?;
        if response.final_url != url {
            self.guard
                .validate(&response.final_url)
                .await
                .map_err(|e| PageError::from_guard(response.final_url.as_str(), e))?;
        }
        if response.is_error_status() {
            return Err(PageError::http_status(page_url, response.status));
        }
        Ok(response.body)
    }

    /// Walks every listing page of the board and returns its threads
    async fn collect_threads(&self, state: &mut CrawlState) -> Vec<String> {
        let Some(first) = self.fetch_page(state, &self.base_url).await else {
            return Vec::new();
        };
        let Ok(base) = Url::parse(&self.base_url) else {
            return Vec::new();
        };

        let (mut threads, pages) = {
            let document = Html::parse_document(&first);
            let root = document.root_element();
            (
                thread_links(&root, &base, &self.selectors),
                page_count(&root, &self.selectors.page_nav),
            )
        };
        let mut seen: HashSet<String> = threads.iter().cloned().collect();

        // Page 1 of the listing is the board page itself
        for listing in numbered_pages(&self.base_url, pages).iter().skip(1) {
            if self.is_cancelled() {
                break;
            }
            let Some(html) = self.fetch_page(state, listing).await else {
                continue;
            };
            let Ok(listing_url) = Url::parse(listing) else {
                continue;
            };
            let found = {
                let document = Html::parse_document(&html);
                thread_links(&document.root_element(), &listing_url, &self.selectors)
            };
            threads.extend(found.into_iter().filter(|t| seen.insert(t.clone())));
        }

        tracing::info!("Found {} threads on {} listing pages", threads.len(), pages);
        threads
    }

    /// Turns the posts of one thread page into documents, applying the sync marker
    fn post_documents(
        &self,
        state: &mut CrawlState,
        page_url: &str,
        title: &str,
        posts: Vec<ForumPost>,
    ) -> Vec<Document> {
        let mut documents = Vec::new();
        for (index, post) in posts.into_iter().enumerate() {
            state.saw_any_item = true;

            let emit = match post.posted_at {
                Some(ts) => self.marker.should_emit(ts),
                None => self.marker.first_run,
            };
            if !emit {
                continue;
            }

            let anchor = post.anchor.unwrap_or_else(|| index.to_string());
            let mut document = Document::single_section(
                format!("{}#{}", page_url, anchor),
                page_url,
                post.text,
                DocumentSource::Xenforo,
                title,
            )
            .with_metadata("type", "post");
            if let Some(ts) = post.posted_at {
                document = document.with_metadata("posted_at", ts.to_rfc3339());
            }
            documents.push(document);
        }
        documents
    }

    fn crawl(self) -> impl Stream<Item = Result<Vec<Document>>> + Send {
        try_stream! {
            let mut state = CrawlState::new();
            let mut batcher = DocumentBatcher::new(self.batch_size);
            let mut cancelled = false;

            tracing::info!("Starting {} crawl from {}", self.mode, self.base_url);

            let threads = match self.mode {
                CrawlMode::ForumBoard => self.collect_threads(&mut state).await,
                _ => vec![self.base_url.clone()],
            };

            'threads: for (position, thread) in threads.iter().enumerate() {
                if self.is_cancelled() {
                    cancelled = true;
                    break;
                }
                tracing::info!("Processing thread {}/{}: {}", position + 1, threads.len(), thread);

                let Some(first_html) = self.fetch_page(&mut state, thread).await else {
                    continue;
                };
                let first = {
                    let document = Html::parse_document(&first_html);
                    scrape_thread(&document.root_element(), &self.selectors)
                };
                let title = first.title.clone().unwrap_or_else(|| thread.clone());
                let pages = numbered_pages(thread, first.page_count);
                let mut first = Some(first);

                for page_url in &pages {
                    let page = match first.take() {
                        Some(page) => page,
                        None => {
                            if self.is_cancelled() {
                                cancelled = true;
                                break 'threads;
                            }
                            let Some(html) = self.fetch_page(&mut state, page_url).await else {
                                continue;
                            };
                            let document = Html::parse_document(&html);
                            scrape_thread(&document.root_element(), &self.selectors)
                        }
                    };

                    for document in self.post_documents(&mut state, page_url, &title, page.posts) {
                        batcher.add(document);
                        if let Some(batch) = batcher.flush_if_full() {
                            state.record_emitted(batch.len());
                            yield batch;
                        }
                    }
                }
            }

            if let Some(batch) = batcher.final_flush() {
                state.record_emitted(batch.len());
                yield batch;
            }

            tracing::info!(
                "Forum crawl finished: {} pages fetched, {} posts emitted, {} pages skipped",
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
}

impl Connector for ForumConnector {
    fn name(&self) -> &'static str {
        "forum"
    }

    fn next_sync_marker(&self) -> Option<SyncMarker> {
        Some(SyncMarker::since(self.started_at))
    }

    fn produce(self: Box<Self>) -> BatchStream {
        Box::pin((*self).crawl())
    }
}
