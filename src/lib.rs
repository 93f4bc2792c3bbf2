//! Sumi-Sieve: a web and forum document harvester
//!
//! This crate walks a site (or a forum board/thread) from a single seed URL,
//! guards every request against internal-network targets, renders and cleans
//! each page, and hands the results downstream as bounded document batches.

pub mod config;
pub mod crawler;
pub mod document;
pub mod extract;
pub mod guard;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Sieve operations
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised once, at the end of a crawl that produced no documents at all
    #[error("{0}")]
    TerminalCrawlFailure(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

// Re-export commonly used types
pub use config::{Config, CrawlMode};
pub use crawler::{build_connector, BatchStream, Connector, CrawlOptions};
pub use document::{Document, DocumentSource, Section};
pub use state::{PageError, PageErrorKind, SyncMarker};
