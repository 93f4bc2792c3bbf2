//! Output sink trait and errors
//!
//! A sink receives every batch the crawl stream yields, in order.

use crate::document::Document;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for document batches
pub trait BatchSink {
    /// Writes one batch
    fn write_batch(&mut self, batch: &[Document]) -> OutputResult<()>;

    /// Flushes anything buffered; called once after the last batch
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

/// Collects batches in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<Document>>,
}

impl BatchSink for MemorySink {
    fn write_batch(&mut self, batch: &[Document]) -> OutputResult<()> {
        self.batches.push(batch.to_vec());
        Ok(())
    }
}
