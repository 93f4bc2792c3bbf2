//! Output module for writing crawl results
//!
//! This module handles:
//! - Writing document batches as JSON lines
//! - Recording and printing run statistics

mod jsonl;
pub mod stats;
mod traits;

pub use jsonl::JsonlSink;
pub use stats::{print_statistics, RunStatistics};
pub use traits::{BatchSink, MemorySink, OutputError, OutputResult};

use crate::crawler::BatchStream;
use crate::SieveError;
use futures::StreamExt;

/// Errors from draining a batch stream into a sink
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error(transparent)]
    Crawl(#[from] SieveError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Pulls every batch from `stream` into `sink`
///
/// Stops at the first crawl or output error. Batches written before the
/// error stay written.
pub async fn drain_into(
    mut stream: BatchStream,
    sink: &mut dyn BatchSink,
    stats: &mut RunStatistics,
) -> Result<(), DrainError> {
    while let Some(batch) = stream.next().await {
        let batch = batch?;
        tracing::debug!("Received batch of {} documents", batch.len());
        sink.write_batch(&batch)?;
        stats.record_batch(&batch);
    }
    sink.finish()?;
    Ok(())
}
