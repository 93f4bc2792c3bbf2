//! Plain HTTP fetching
//!
//! Used for binary documents (PDF), sitemaps, forum pages, and by the
//! default HTTP renderer.

use crate::config::FetchConfig;
use crate::guard::{GuardError, SsrfGuard};
use crate::state::PageError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// A redirect hop refused before it was requested
#[derive(Debug, Error)]
#[error("Redirect to {url} blocked: {reason}")]
pub struct RedirectBlocked {
    pub url: String,
    pub reason: GuardError,
}

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpResponse<B> {
    /// URL after following redirects
    pub final_url: Url,
    /// Response status code
    pub status: u16,
    /// Response body
    pub body: B,
}

impl<B> HttpResponse<B> {
    /// Returns true for 4xx and 5xx responses
    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }
}

/// Builds the HTTP client shared by all plain requests of one crawl
///
/// Redirects are followed (up to ten hops); the final URL is re-checked by
/// the caller. With an enforcing guard, hops to non-global IP literals are
/// refused before any connection is made.
pub fn build_http_client(config: &FetchConfig, guard: SsrfGuard) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.extra_headers {
        // Names and values are validated when the configuration is loaded
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(redirect_policy(guard))
        .gzip(true)
        .brotli(true)
        .build()
}

fn redirect_policy(guard: SsrfGuard) -> Policy {
    if !guard.is_enforced() {
        return Policy::limited(MAX_REDIRECTS);
    }

    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        match guard.check_literal(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(reason) => {
                let url = attempt.url().to_string();
                attempt.error(RedirectBlocked { url, reason })
            }
        }
    })
}

/// Describes a transport failure the way it is reported in `last_error`
pub fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else if error.is_redirect() {
        match std::error::Error::source(error).and_then(|e| e.downcast_ref::<RedirectBlocked>()) {
            Some(blocked) => blocked.to_string(),
            None => "Too many redirects".to_string(),
        }
    } else {
        error.to_string()
    }
}

/// Fetches `url` and returns its body as text
pub async fn fetch_text(client: &Client, url: &Url) -> Result<HttpResponse<String>, PageError> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| PageError::network(url.as_str(), describe_request_error(&e)))?;

    let final_url = response.url().clone();
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| PageError::network(url.as_str(), describe_request_error(&e)))?;

    Ok(HttpResponse {
        final_url,
        status,
        body,
    })
}

/// Fetches `url` and returns its body as raw bytes
pub async fn fetch_bytes(client: &Client, url: &Url) -> Result<HttpResponse<Vec<u8>>, PageError> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| PageError::network(url.as_str(), describe_request_error(&e)))?;

    let final_url = response.url().clone();
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| PageError::network(url.as_str(), describe_request_error(&e)))?
        .to_vec();

    Ok(HttpResponse {
        final_url,
        status,
        body,
    })
}

/// Returns true when the URL path names a PDF document
pub fn is_pdf_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
