//! Normalized documents handed to the downstream ingestion pipeline

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Connector type that produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Generic web crawl (recursive, single page, sitemap, URL list)
    Web,
    /// XenForo-style forum board or thread
    Xenforo,
}

impl DocumentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Xenforo => "xenforo",
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched unit of text tied to its source URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub link: String,
    pub text: String,
}

/// A normalized document
///
/// `id` is stable across re-crawls of the same logical item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub sections: Vec<Section>,
    pub source: DocumentSource,
    pub semantic_identifier: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Builds a single-section document whose section links back to `link`
    pub fn single_section(
        id: impl Into<String>,
        link: impl Into<String>,
        text: impl Into<String>,
        source: DocumentSource,
        semantic_identifier: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sections: vec![Section {
                link: link.into(),
                text: text.into(),
            }],
            source,
            semantic_identifier: semantic_identifier.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
