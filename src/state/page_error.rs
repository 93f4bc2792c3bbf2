//! Per-URL failure definitions
//!
//! Every page that does not produce a document ends in exactly one of these
//! kinds. None of them stops the crawl.

use crate::guard::GuardError;
use std::fmt;

/// Category of a per-URL failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageErrorKind {
    /// Bad scheme, missing host, or an address rejected by the SSRF guard
    UrlValidation,

    /// Host name did not resolve
    DnsResolution,

    /// Timeout, connection failure, navigation failure
    Network,

    /// The fetch succeeded but the server answered 4xx/5xx
    HttpStatus,

    /// The content could not be turned into text
    Extraction,
}

impl PageErrorKind {
    /// Returns true if the fetch session must be relaunched before the next fetch
    pub fn restarts_session(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Converts to a short label used in logs and run summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlValidation => "url_validation",
            Self::DnsResolution => "dns_resolution",
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::Extraction => "extraction",
        }
    }

    /// Returns all kinds
    pub fn all_kinds() -> Vec<Self> {
        vec![
            Self::UrlValidation,
            Self::DnsResolution,
            Self::Network,
            Self::HttpStatus,
            Self::Extraction,
        ]
    }
}

impl fmt::Display for PageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-URL failure, recorded as the crawl's `last_error` and skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub url: String,
    pub kind: PageErrorKind,
    pub detail: String,
}

impl PageError {
    pub fn new(url: impl Into<String>, kind: PageErrorKind, detail: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(url: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::new(url, PageErrorKind::Network, detail.to_string())
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::new(url, PageErrorKind::HttpStatus, format!("HTTP {} response", status))
    }

    pub fn extraction(url: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::new(url, PageErrorKind::Extraction, detail.to_string())
    }

    /// Wraps a guard rejection; DNS failures keep their own kind
    pub fn from_guard(url: impl Into<String>, err: GuardError) -> Self {
        let kind = match err {
            GuardError::DnsFailure { .. } => PageErrorKind::DnsResolution,
            _ => PageErrorKind::UrlValidation,
        };
        Self::new(url, kind, err.to_string())
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PageErrorKind::UrlValidation | PageErrorKind::DnsResolution => {
                write!(f, "Invalid URL {} due to {}", self.url, self.detail)
            }
            PageErrorKind::Network => write!(f, "Failed to fetch '{}': {}", self.url, self.detail),
            PageErrorKind::HttpStatus => {
                write!(f, "Skipped indexing {} due to {}", self.url, self.detail)
            }
            PageErrorKind::Extraction => write!(
                f,
                "Failed to extract content from '{}': {}",
                self.url, self.detail
            ),
        }
    }
}

impl std::error::Error for PageError {}
