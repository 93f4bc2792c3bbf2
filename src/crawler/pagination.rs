//! Seed expansion and page enumeration
//!
//! Three strategies decide which URLs a crawl visits besides the ones it
//! discovers by following links:
//!
//! - **Sitemap**: every `<loc>` entry of a sitemap document
//! - **Numbered pages**: `{base}page-1` .. `{base}page-N`, where N is the
//!   largest number among the pagination controls of the first page
//! - **Link following**: handled by the crawl loop via
//!   [`discover_links`](crate::crawler::discover_links)

use crate::crawler::fetcher::fetch_text;
use crate::crawler::parser::{selector, DomNode};
use crate::guard::SsrfGuard;
use crate::state::PageError;
use crate::url::ensure_absolute;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

/// Returns the absolute URL of every `<loc>` entry in a sitemap
///
/// Relative entries are resolved against the sitemap's own URL; absolute
/// entries are kept byte for byte.
pub fn sitemap_locations(xml: &str, sitemap_url: &Url) -> Vec<String> {
    let Some(loc) = selector("loc") else {
        return Vec::new();
    };

    let document = Html::parse_document(xml);
    document
        .root_element()
        .children(&loc)
        .into_iter()
        .filter_map(|node| {
            let raw = DomNode::text(&node);
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            match ensure_absolute(sitemap_url, raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skipping sitemap entry: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Fetches a sitemap and returns its entries
pub async fn fetch_sitemap(
    client: &Client,
    guard: &SsrfGuard,
    sitemap_url: &Url,
) -> Result<Vec<String>, PageError> {
    guard
        .validate(sitemap_url)
        .await
        .map_err(|e| PageError::from_guard(sitemap_url.as_str(), e))?;

    let response = fetch_text(client, sitemap_url).await?;
    if response.is_error_status() {
        return Err(PageError::http_status(sitemap_url.as_str(), response.status));
    }

    let locations = sitemap_locations(&response.body, &response.final_url);
    info!("Sitemap {} lists {} pages", sitemap_url, locations.len());
    Ok(locations)
}

/// Returns the largest page number among the pagination controls, or 1
///
/// Controls whose label is not a positive integer (ellipses, "Next") are
/// ignored.
pub fn page_count<N: DomNode>(root: &N, page_nav: &Selector) -> u32 {
    root.children(page_nav)
        .iter()
        .filter_map(|control| control.text().trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .max()
        .unwrap_or(1)
}

/// Generates `{base}page-1` .. `{base}page-{count}`
///
/// `base` is expected to end in `/`.
pub fn numbered_pages(base: &str, count: u32) -> Vec<String> {
    (1..=count.max(1))
        .map(|n| format!("{}page-{}", base, n))
        .collect()
}
