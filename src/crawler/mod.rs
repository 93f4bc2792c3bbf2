//! Crawler module for fetching, paginating and batching documents
//!
//! This module contains the crawl strategies and their building blocks:
//! - Fetch session management (renderer lifecycle, plain HTTP for PDFs)
//! - HTML parsing and same-origin link discovery
//! - Sitemap and numbered-page enumeration
//! - Document batching and the terminal-failure check
//! - The web and forum connectors that tie them together

mod batcher;
#[cfg(feature = "chromium")]
mod chromium;
mod coordinator;
mod fetcher;
mod forum;
mod pagination;
mod parser;
mod session;

pub use batcher::{assert_progress, DocumentBatcher};
#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;
pub use coordinator::WebConnector;
pub use fetcher::{build_http_client, fetch_bytes, fetch_text, is_pdf_url, HttpResponse};
pub use forum::{
    parse_post_time, sanitize_title, scrape_thread, thread_links, ForumConnector, ForumPost,
    ForumSelectors, ThreadPage,
};
pub use pagination::{fetch_sitemap, numbered_pages, page_count, sitemap_locations};
pub use parser::{discover_links, DomNode};
pub use session::{
    build_renderer, FetchError, FetchResult, FetchSession, HttpRenderer, PageRenderer, RenderedPage,
};

use crate::config::Config;
use crate::document::Document;
use crate::state::SyncMarker;
use crate::{Result, SieveError};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Lazy, finite, non-restartable sequence of document batches
pub type BatchStream = Pin<Box<dyn Stream<Item = std::result::Result<Vec<Document>, SieveError>> + Send>>;

/// A crawl strategy that produces document batches
pub trait Connector: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Accepts credentials from the host
    ///
    /// None of the built-in connectors authenticate; any credentials passed
    /// in are ignored with a warning.
    fn load_credentials(&mut self, credentials: &HashMap<String, String>) -> Option<HashMap<String, String>> {
        if !credentials.is_empty() {
            tracing::warn!(
                "Unexpected credentials provided for {} connector; they will be ignored",
                self.name()
            );
        }
        None
    }

    /// Marker the caller should store once the stream has completed
    ///
    /// `None` for sources without per-item timestamps.
    fn next_sync_marker(&self) -> Option<SyncMarker> {
        None
    }

    /// Consumes the connector and returns its batch stream
    fn produce(self: Box<Self>) -> BatchStream;
}

/// Per-run inputs that do not come from the configuration file
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Position of the previous successful run (forum modes only)
    pub sync_marker: SyncMarker,
    /// Stops the crawl before its next fetch once cancelled
    pub cancel: Option<CancellationToken>,
}

/// Builds the connector for the configured mode
pub fn build_connector(config: &Config, options: CrawlOptions) -> Result<Box<dyn Connector>> {
    if config.crawl.mode.is_forum() {
        Ok(Box::new(ForumConnector::new(
            config,
            options.sync_marker,
            options.cancel,
        )?))
    } else {
        Ok(Box::new(WebConnector::new(config, options.cancel)?))
    }
}
