use crate::document::Document;
use crate::state::CrawlState;
use crate::SieveError;

/// Accumulates documents and releases them in fixed-size batches
#[derive(Debug)]
pub struct DocumentBatcher {
    batch_size: usize,
    pending: Vec<Document>,
}

impl DocumentBatcher {
    /// Creates a batcher; a `batch_size` of 0 is treated as 1
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Vec::with_capacity(batch_size),
        }
    }

    pub fn add(&mut self, document: Document) {
        self.pending.push(document);
    }

    /// Number of documents waiting for the next batch
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Takes a full batch, if one has accumulated
    pub fn flush_if_full(&mut self) -> Option<Vec<Document>> {
        if self.pending.len() >= self.batch_size {
            let rest = self.pending.split_off(self.batch_size);
            Some(std::mem::replace(&mut self.pending, rest))
        } else {
            None
        }
    }

    /// Takes whatever is left, if anything
    pub fn final_flush(&mut self) -> Option<Vec<Document>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Fails a crawl that emitted nothing and saw nothing
///
/// Uses the crawl's last recorded error as the message when there is one.
pub fn assert_progress(state: &CrawlState) -> Result<(), SieveError> {
    if state.emitted_any_document || state.saw_any_item {
        Ok(())
    } else {
        Err(SieveError::TerminalCrawlFailure(state.terminal_message()))
    }
}
