use crate::document::Document;
use crate::output::traits::{BatchSink, OutputResult};
use std::io::Write;

/// Writes one JSON object per document, one document per line
#[derive(Debug)]
pub struct JsonlSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of documents written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> BatchSink for JsonlSink<W> {
    fn write_batch(&mut self, batch: &[Document]) -> OutputResult<()> {
        for document in batch {
            serde_json::to_writer(&mut self.writer, document)?;
            self.writer.write_all(b"\n")?;
            self.written += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
