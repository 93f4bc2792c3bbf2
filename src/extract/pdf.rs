//! PDF byte-to-text conversion

/// Converts PDF bytes to plain text
pub trait PdfToText: Send + Sync {
    fn pdf_to_text(&self, bytes: &[u8]) -> Result<String, String>;
}

/// [`PdfToText`] backed by the `pdf-extract` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractText;

impl PdfToText for PdfExtractText {
    fn pdf_to_text(&self, bytes: &[u8]) -> Result<String, String> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
    }
}
