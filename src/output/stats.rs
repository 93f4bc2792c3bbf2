//! Run statistics for the batches a crawl produced

use crate::document::{Document, DocumentSource};
use crate::state::SyncMarker;
use std::collections::BTreeMap;

/// Counts accumulated while consuming a batch stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Number of batches received
    pub batches: u64,

    /// Number of documents received
    pub documents: u64,

    /// Size of the largest batch
    pub largest_batch: usize,

    /// Documents per source
    pub by_source: BTreeMap<DocumentSource, u64>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one batch
    pub fn record_batch(&mut self, batch: &[Document]) {
        self.batches += 1;
        self.documents += batch.len() as u64;
        self.largest_batch = self.largest_batch.max(batch.len());
        for document in batch {
            *self.by_source.entry(document.source).or_insert(0) += 1;
        }
    }
}

/// Prints statistics to stderr in a formatted manner
pub fn print_statistics(stats: &RunStatistics, next_marker: Option<&SyncMarker>) {
    eprintln!("=== Crawl Statistics ===\n");

    eprintln!("Overview:");
    eprintln!("  Batches: {}", stats.batches);
    eprintln!("  Documents: {}", stats.documents);
    eprintln!("  Largest batch: {}", stats.largest_batch);
    eprintln!();

    if !stats.by_source.is_empty() {
        eprintln!("Documents by Source:");
        for (source, count) in &stats.by_source {
            eprintln!("  {}: {}", source, count);
        }
        eprintln!();
    }

    if let Some(marker) = next_marker.and_then(|m| m.last_synced_at) {
        eprintln!("Next sync marker: {}", marker.to_rfc3339());
    }
}
