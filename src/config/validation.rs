use crate::config::types::{Config, CrawlConfig, CrawlMode, FetchConfig, ForumConfig, RendererKind};
use crate::url::ensure_scheme;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_fetch_config(&config.fetch)?;
    if config.crawl.mode.is_forum() {
        validate_forum_config(&config.forum)?;
    }
    Ok(())
}

/// Validates the crawl target and traversal settings
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.seed_url.trim().is_empty() {
        return Err(ConfigError::Validation("seed_url cannot be empty".to_string()));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    // url-list seeds are file paths, checked when the file is read
    if config.mode != CrawlMode::UrlList {
        validate_seed_url(&config.seed_url)?;
    }

    for tag in &config.additional_noise_tags {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "additional_noise_tags entry '{}' is not a valid element name",
                tag
            )));
        }
    }

    Ok(())
}

/// Validates a seed URL, applying the same https:// defaulting the crawler uses
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(&ensure_scheme(seed))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

/// Validates network settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation("user_agent cannot be empty".to_string()));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_secs must be >= 1, got {}",
            config.navigation_timeout_secs
        )));
    }

    if config.renderer == RendererKind::Chromium && !cfg!(feature = "chromium") {
        return Err(ConfigError::Validation(
            "renderer = \"chromium\" requires building with the `chromium` feature".to_string(),
        ));
    }

    for (name, value) in &config.extra_headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("extra_headers: invalid header name '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("extra_headers: invalid value for '{}'", name))
        })?;
    }

    Ok(())
}

/// Validates forum selectors (only consulted in forum modes)
fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    for (field, selector) in [
        ("page_nav_selector", &config.page_nav_selector),
        ("thread_title_selector", &config.thread_title_selector),
        ("title_selector", &config.title_selector),
        ("post_selector", &config.post_selector),
        ("post_body_selector", &config.post_body_selector),
    ] {
        Selector::parse(selector).map_err(|_| {
            ConfigError::Validation(format!("{} is not a valid CSS selector: '{}'", field, selector))
        })?;
    }
    Ok(())
}
