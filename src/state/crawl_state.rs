use crate::state::{Frontier, PageError, PageErrorKind};
use std::collections::HashMap;

/// Message used when a crawl ends without a document and without a recorded error
pub const NO_VALID_PAGES: &str = "No valid pages found.";

/// Mutable state of one crawl run
///
/// Owned by exactly one crawl; created when its stream starts and dropped
/// when the stream ends.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Visited and pending URLs
    pub frontier: Frontier,

    /// Most recent per-URL failure, rendered as text
    pub last_error: Option<String>,

    /// Whether any batch has been handed downstream
    pub emitted_any_document: bool,

    /// Whether the source produced items at all, even if all were filtered out
    pub saw_any_item: bool,

    /// Pages fetched (successfully or not)
    pub pages_visited: u64,

    /// Documents handed downstream
    pub documents_emitted: u64,

    /// Per-kind failure counts
    pub failures: HashMap<PageErrorKind, u64>,
}

impl CrawlState {
    /// Creates a state with an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state whose frontier holds the given seeds
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frontier: Frontier::with_seeds(seeds),
            ..Self::default()
        }
    }

    /// Records a skipped URL: logs it, counts it and keeps it as `last_error`
    pub fn record_failure(&mut self, error: &PageError) {
        let message = error.to_string();
        match error.kind {
            PageErrorKind::HttpStatus => tracing::info!("{}", message),
            PageErrorKind::Network => tracing::error!("{}", message),
            _ => tracing::warn!("{}", message),
        }
        *self.failures.entry(error.kind).or_insert(0) += 1;
        self.last_error = Some(message);
    }

    /// Records that a batch of `count` documents was handed downstream
    pub fn record_emitted(&mut self, count: usize) {
        if count > 0 {
            self.emitted_any_document = true;
            self.documents_emitted += count as u64;
        }
    }

    /// Total number of skipped URLs
    pub fn failure_count(&self) -> u64 {
        self.failures.values().sum()
    }

    /// Per-kind failure counts as `kind=count` pairs, in a fixed order
    pub fn failure_breakdown(&self) -> String {
        PageErrorKind::all_kinds()
            .into_iter()
            .filter_map(|kind| self.failures.get(&kind).map(|n| format!("{}={}", kind, n)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Message for the terminal failure: the last error, or a generic one
    pub fn terminal_message(&self) -> String {
        self.last_error
            .clone()
            .unwrap_or_else(|| NO_VALID_PAGES.to_string())
    }
}
