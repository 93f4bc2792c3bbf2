//! Headless Chromium renderer
//!
//! Each navigation opens a fresh tab, waits for the network to go idle (and
//! again after any client-side redirect), serializes the DOM, and closes the
//! tab. The browser process itself lives from `launch` to `shutdown`.

use crate::config::FetchConfig;
use crate::crawler::session::{IdleTracker, PageRenderer, RenderedPage};
use crate::{Result, SieveError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive unchanged polls that count as network idle
const IDLE_QUIET_POLLS: u32 = 2;

const LOAD_STATE_SCRIPT: &str =
    "[document.readyState, performance.getEntriesByType('resource').length]";

fn render_error(error: impl std::fmt::Display) -> SieveError {
    SieveError::Render(error.to_string())
}

/// [`PageRenderer`] driving a headless Chromium over CDP
pub struct ChromiumRenderer {
    user_agent: String,
    extra_headers: HashMap<String, String>,
    /// Longest wait for network idle per settle; leaves room inside the
    /// navigation timeout
    settle_budget: Duration,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumRenderer {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            extra_headers: config.extra_headers.clone(),
            settle_budget: Duration::from_secs(config.navigation_timeout_secs) / 3,
            browser: None,
            handler: None,
        }
    }

    /// Polls the page until it is idle or the settle budget runs out
    ///
    /// A page that never goes quiet (long polling, streaming) is read as is.
    async fn wait_for_idle(&self, page: &Page) {
        let deadline = Instant::now() + self.settle_budget;
        let mut idle = IdleTracker::new(IDLE_QUIET_POLLS);

        while Instant::now() < deadline {
            match page.evaluate(LOAD_STATE_SCRIPT).await {
                Ok(result) => match result.into_value::<(String, u64)>() {
                    Ok((ready_state, resources)) => {
                        if idle.observe(&ready_state, resources) {
                            return;
                        }
                    }
                    Err(e) => debug!("Unexpected load state result: {}", e),
                },
                // The execution context goes away while the page navigates
                Err(e) => {
                    debug!("Load state check failed: {}", e);
                    idle.reset();
                }
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
        debug!("Page did not go idle within {:?}", self.settle_budget);
    }
}

async fn current_url(page: &Page) -> Result<Option<Url>> {
    Ok(page
        .url()
        .await
        .map_err(render_error)?
        .and_then(|current| Url::parse(&current).ok()))
}

/// Converts a CDP status to an HTTP status; out-of-range values are unknown
fn document_status(status: i64) -> Option<u16> {
    u16::try_from(status).ok().filter(|s| (100..600).contains(s))
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn launch(&mut self) -> Result<()> {
        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .build()
            .map_err(render_error)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(render_error)?;

        // The CDP handler must be polled for the browser to make progress
        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        self.browser = Some(browser);
        self.handler = Some(task);
        Ok(())
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| render_error("browser is not running"))?;

        let page = browser.new_page("about:blank").await.map_err(render_error)?;

        if !self.extra_headers.is_empty() {
            let headers = Headers::new(serde_json::json!(self.extra_headers));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(render_error)?;
        }

        page.goto(url.as_str()).await.map_err(render_error)?;
        let status = page
            .wait_for_navigation_response()
            .await
            .map_err(render_error)?
            .and_then(|request| request.response.as_ref().map(|response| response.status))
            .and_then(document_status);

        let landed = current_url(&page).await?;
        self.wait_for_idle(&page).await;

        let mut final_url = current_url(&page).await?;
        if final_url != landed {
            debug!(
                "Client-side redirect from {:?} to {:?}",
                landed.as_ref().map(Url::as_str),
                final_url.as_ref().map(Url::as_str)
            );
            self.wait_for_idle(&page).await;
            final_url = current_url(&page).await?;
        }
        let final_url = final_url.unwrap_or_else(|| url.clone());
        let html = page.content().await.map_err(render_error)?;

        if let Err(e) = page.close().await {
            warn!("Failed to close tab for {}: {}", url, e);
        }

        Ok(RenderedPage {
            final_url,
            status,
            html,
        })
    }

    async fn shutdown(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
