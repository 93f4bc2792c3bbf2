//! Content extraction
//!
//! Turns fetched page content into cleaned text plus an optional title.
//! HTML goes through [`HtmlCleaner`]; PDF bytes go through a [`PdfToText`]
//! implementation.

mod html;
mod pdf;

pub use html::{normalize_text, CleanedHtml, HtmlCleaner};
pub use pdf::{PdfExtractText, PdfToText};

use crate::config::CrawlConfig;
use std::sync::Arc;

/// Text recovered from one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: Option<String>,
    pub cleaned_text: String,
}

impl From<CleanedHtml> for Extracted {
    fn from(cleaned: CleanedHtml) -> Self {
        Self {
            title: cleaned.title,
            cleaned_text: cleaned.cleaned_text,
        }
    }
}

/// Fetched content, tagged with how it should be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    Html(String),
    Pdf(Vec<u8>),
}

/// Extracts text from HTML or PDF content
#[derive(Clone)]
pub struct ContentExtractor {
    html: HtmlCleaner,
    pdf: Arc<dyn PdfToText>,
}

impl ContentExtractor {
    pub fn new(html: HtmlCleaner, pdf: Arc<dyn PdfToText>) -> Self {
        Self { html, pdf }
    }

    /// Builds the extractor described by the crawl configuration
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            HtmlCleaner::new(
                &config.additional_noise_tags,
                config.apply_boilerplate_cleanup,
            ),
            Arc::new(PdfExtractText),
        )
    }

    /// Extracts text from `content`
    ///
    /// HTML never fails. PDF conversion errors are returned as their message.
    pub fn extract(&self, content: &PageContent) -> Result<Extracted, String> {
        match content {
            PageContent::Html(html) => Ok(self.html.clean(html).into()),
            PageContent::Pdf(bytes) => {
                let text = self.pdf.pdf_to_text(bytes)?;
                Ok(Extracted {
                    title: None,
                    cleaned_text: normalize_text(&text),
                })
            }
        }
    }
}

impl std::fmt::Debug for ContentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentExtractor")
            .field("html", &self.html)
            .finish_non_exhaustive()
    }
}
