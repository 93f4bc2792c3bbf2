//! Fetch session management
//!
//! A [`FetchSession`] owns the page renderer for one crawl. The renderer is
//! launched lazily before the first rendered fetch, marked for restart when
//! a navigation fails, and relaunched just before the next fetch that needs
//! it. PDF URLs bypass the renderer and use a plain HTTP request.

use crate::config::{FetchConfig, RendererKind};
use crate::crawler::fetcher::{describe_request_error, fetch_bytes, is_pdf_url};
use crate::extract::PageContent;
use crate::guard::SsrfGuard;
use crate::state::{PageError, SessionState};
use crate::{Result, SieveError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// HTML produced by one rendered navigation
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the navigation settled on
    pub final_url: Url,
    /// Status of the main document, when the back-end reports it
    pub status: Option<u16>,
    /// Serialized DOM
    pub html: String,
}

/// Back-end that turns a URL into rendered HTML
#[async_trait]
pub trait PageRenderer: Send {
    /// Starts the back-end (browser process, connection pool, ...)
    async fn launch(&mut self) -> Result<()>;

    /// Navigates to `url` and returns the settled page
    async fn render(&mut self, url: &Url) -> Result<RenderedPage>;

    /// Releases everything `launch` acquired
    async fn shutdown(&mut self);
}

/// Decides when a rendered page has stopped loading
///
/// A page is idle once the document reports `complete` and its count of
/// loaded resources has held still for `quiet_polls` consecutive polls.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    quiet_polls: u32,
    stable_polls: u32,
    last_count: Option<u64>,
}

impl IdleTracker {
    pub fn new(quiet_polls: u32) -> Self {
        Self {
            quiet_polls: quiet_polls.max(1),
            stable_polls: 0,
            last_count: None,
        }
    }

    /// Records one poll and returns true once the page is idle
    pub fn observe(&mut self, ready_state: &str, resource_count: u64) -> bool {
        let unchanged = self.last_count == Some(resource_count);
        self.last_count = Some(resource_count);

        if ready_state == "complete" && unchanged {
            self.stable_polls += 1;
        } else {
            self.stable_polls = 0;
        }
        self.stable_polls >= self.quiet_polls
    }

    /// Forgets everything seen so far, e.g. after the page navigated away
    pub fn reset(&mut self) {
        self.stable_polls = 0;
        self.last_count = None;
    }
}

/// Renderer that performs a plain GET and returns the response body
///
/// Page scripts are not executed.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn launch(&mut self) -> Result<()> {
        Ok(())
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SieveError::Render(describe_request_error(&e)))?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let html = response
            .text()
            .await
            .map_err(|e| SieveError::Render(describe_request_error(&e)))?;

        Ok(RenderedPage {
            final_url,
            status: Some(status),
            html,
        })
    }

    async fn shutdown(&mut self) {}
}

/// Builds the renderer selected in the fetch configuration
pub fn build_renderer(config: &FetchConfig, client: Client) -> Result<Box<dyn PageRenderer>> {
    match config.renderer {
        RendererKind::Http => Ok(Box::new(HttpRenderer::new(client))),
        #[cfg(feature = "chromium")]
        RendererKind::Chromium => Ok(Box::new(crate::crawler::chromium::ChromiumRenderer::new(
            config,
        ))),
        #[cfg(not(feature = "chromium"))]
        RendererKind::Chromium => Err(SieveError::Config(crate::ConfigError::Validation(
            "renderer = \"chromium\" requires the `chromium` feature".to_string(),
        ))),
    }
}

/// Result of fetching one URL
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested
    pub requested_url: Url,
    /// URL the fetch ended on after redirects
    pub final_url: Url,
    /// HTTP status, when known
    pub status: Option<u16>,
    /// Page content
    pub content: PageContent,
}

impl FetchResult {
    /// Returns true if the fetch ended on a different URL than requested
    pub fn redirected(&self) -> bool {
        self.final_url != self.requested_url
    }

    /// Returns true for 4xx and 5xx responses
    pub fn is_error_status(&self) -> bool {
        self.status.map_or(false, |status| status >= 400)
    }
}

/// Why a fetch produced no page
#[derive(Debug)]
pub enum FetchError {
    /// The URL is skipped and the crawl moves on
    Page(PageError),
    /// The renderer could not be started at all; the crawl cannot continue
    Launch(SieveError),
}

impl From<PageError> for FetchError {
    fn from(error: PageError) -> Self {
        Self::Page(error)
    }
}

/// Renderer lifecycle plus the plain HTTP path for one crawl
pub struct FetchSession {
    renderer: Box<dyn PageRenderer>,
    client: Client,
    guard: SsrfGuard,
    state: SessionState,
    navigation_timeout: Duration,
    launches: u32,
}

impl FetchSession {
    pub fn new(
        renderer: Box<dyn PageRenderer>,
        client: Client,
        guard: SsrfGuard,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            client,
            guard,
            state: SessionState::Stopped,
            navigation_timeout,
            launches: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of times the renderer has been launched
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Fetches `url`
    ///
    /// If the fetch ends on a different URL, that URL is checked by the SSRF
    /// guard before the result is returned. Error statuses are returned as
    /// results; only transport and rendering failures are errors. A renderer
    /// that fails its very first launch is a [`FetchError::Launch`]; later
    /// relaunch failures only skip the URL.
    pub async fn fetch(&mut self, url: &Url) -> std::result::Result<FetchResult, FetchError> {
        let (final_url, status, content) = if is_pdf_url(url) {
            let response = fetch_bytes(&self.client, url).await?;
            (
                response.final_url,
                Some(response.status),
                PageContent::Pdf(response.body),
            )
        } else {
            let page = self.render(url).await?;
            (page.final_url, page.status, PageContent::Html(page.html))
        };

        if final_url != *url {
            self.guard
                .validate(&final_url)
                .await
                .map_err(|e| PageError::from_guard(final_url.as_str(), e))?;
        }

        Ok(FetchResult {
            requested_url: url.clone(),
            final_url,
            status,
            content,
        })
    }

    /// Stops the renderer; the next rendered fetch relaunches it
    pub async fn release(&mut self) {
        if matches!(self.state, SessionState::Healthy | SessionState::NeedsRestart) {
            self.renderer.shutdown().await;
            self.transition(SessionState::Stopped);
        }
    }

    async fn render(&mut self, url: &Url) -> std::result::Result<RenderedPage, FetchError> {
        if let Err(e) = self.ensure_launched().await {
            if self.launches == 0 {
                return Err(FetchError::Launch(e));
            }
            return Err(PageError::network(url.as_str(), e).into());
        }

        let outcome = tokio::time::timeout(self.navigation_timeout, self.renderer.render(url)).await;
        let result = match outcome {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(PageError::network(url.as_str(), e)),
            Err(_) => Err(PageError::network(
                url.as_str(),
                format!(
                    "Navigation timed out after {}s",
                    self.navigation_timeout.as_secs_f32()
                ),
            )),
        };

        if let Err(error) = &result {
            if error.kind.restarts_session() {
                self.transition(SessionState::NeedsRestart);
            }
        }
        result.map_err(FetchError::Page)
    }

    async fn ensure_launched(&mut self) -> Result<()> {
        if !self.state.needs_launch() {
            return Ok(());
        }

        if self.state == SessionState::NeedsRestart {
            info!("Restarting rendering session");
            self.renderer.shutdown().await;
        }

        self.transition(SessionState::Restarting);
        match self.renderer.launch().await {
            Ok(()) => {
                self.launches += 1;
                self.transition(SessionState::Healthy);
                Ok(())
            }
            Err(e) => {
                self.transition(SessionState::NeedsRestart);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!("Unexpected session transition {} -> {}", self.state, next);
        }
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PageErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Renderer that fails on `/fail`, hangs on `/slow`, lands `/metadata` on
    /// the cloud metadata address, and counts calls
    #[derive(Default, Clone)]
    struct ScriptedRenderer {
        launches: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
        /// Launch attempts from this index on fail
        fail_launch_from: Option<usize>,
    }

    #[async_trait]
    impl PageRenderer for ScriptedRenderer {
        async fn launch(&mut self) -> Result<()> {
            let attempt = self.launches.fetch_add(1, Ordering::SeqCst);
            match self.fail_launch_from {
                Some(from) if attempt >= from => {
                    Err(SieveError::Render("Could not find chrome executable".to_string()))
                }
                _ => Ok(()),
            }
        }

        async fn render(&mut self, url: &Url) -> Result<RenderedPage> {
            match url.path() {
                "/fail" => Err(SieveError::Render("net::ERR_CONNECTION_RESET".to_string())),
                "/slow" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    unreachable!()
                }
                "/metadata" => Ok(RenderedPage {
                    final_url: Url::parse("http://169.254.169.254/latest").unwrap(),
                    status: Some(200),
                    html: "<p>ami-id</p>".to_string(),
                }),
                _ => Ok(RenderedPage {
                    final_url: url.clone(),
                    status: Some(200),
                    html: format!("<p>{}</p>", url.path()),
                }),
            }
        }

        async fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session_with(renderer: ScriptedRenderer, guard: SsrfGuard) -> FetchSession {
        FetchSession::new(
            Box::new(renderer),
            Client::new(),
            guard,
            Duration::from_millis(200),
        )
    }

    fn session(renderer: ScriptedRenderer) -> FetchSession {
        session_with(renderer, SsrfGuard::disabled())
    }

    fn url(path: &str) -> Url {
        Url::parse("https://example.com/").unwrap().join(path).unwrap()
    }

    fn page_error(error: FetchError) -> PageError {
        match error {
            FetchError::Page(error) => error,
            FetchError::Launch(error) => panic!("expected a page error, got {}", error),
        }
    }

    #[tokio::test]
    async fn test_launch_is_lazy() {
        let renderer = ScriptedRenderer::default();
        let mut session = session(renderer.clone());
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 0);

        let result = session.fetch(&url("/a")).await.unwrap();
        assert_eq!(session.state(), SessionState::Healthy);
        assert_eq!(result.content, PageContent::Html("<p>/a</p>".to_string()));
        assert!(!result.redirected());

        session.fetch(&url("/b")).await.unwrap();
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_restarts_before_next_fetch() {
        let renderer = ScriptedRenderer::default();
        let mut session = session(renderer.clone());

        let err = page_error(session.fetch(&url("/fail")).await.unwrap_err());
        assert_eq!(err.kind, PageErrorKind::Network);
        assert_eq!(session.state(), SessionState::NeedsRestart);
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 1);

        session.fetch(&url("/ok")).await.unwrap();
        assert_eq!(session.state(), SessionState::Healthy);
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 2);
        assert_eq!(renderer.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_timeout_marks_restart() {
        let mut session = session(ScriptedRenderer::default());
        let err = page_error(session.fetch(&url("/slow")).await.unwrap_err());
        assert_eq!(err.kind, PageErrorKind::Network);
        assert!(err.detail.contains("timed out"));
        assert_eq!(session.state(), SessionState::NeedsRestart);
    }

    #[tokio::test]
    async fn test_first_launch_failure_is_fatal() {
        let renderer = ScriptedRenderer {
            fail_launch_from: Some(0),
            ..ScriptedRenderer::default()
        };
        let mut session = session(renderer);

        match session.fetch(&url("/a")).await.unwrap_err() {
            FetchError::Launch(error) => {
                assert!(error.to_string().contains("Could not find chrome executable"));
            }
            FetchError::Page(error) => panic!("expected a launch failure, got {}", error),
        }
        assert_eq!(session.launches(), 0);
    }

    #[tokio::test]
    async fn test_relaunch_failure_only_skips_the_url() {
        let renderer = ScriptedRenderer {
            fail_launch_from: Some(1),
            ..ScriptedRenderer::default()
        };
        let mut session = session(renderer.clone());

        session.fetch(&url("/a")).await.unwrap();
        page_error(session.fetch(&url("/fail")).await.unwrap_err());

        let err = page_error(session.fetch(&url("/b")).await.unwrap_err());
        assert_eq!(err.kind, PageErrorKind::Network);
        assert!(err.detail.contains("Could not find chrome executable"));
        assert_eq!(session.state(), SessionState::NeedsRestart);
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rendered_redirect_to_internal_address_is_rejected() {
        let mut session = session_with(ScriptedRenderer::default(), SsrfGuard::enforcing());

        let err = page_error(
            session
                .fetch(&Url::parse("http://93.184.216.34/metadata").unwrap())
                .await
                .unwrap_err(),
        );
        assert_eq!(err.kind, PageErrorKind::UrlValidation);
        assert_eq!(err.url, "http://169.254.169.254/latest");
        assert!(err
            .to_string()
            .starts_with("Invalid URL http://169.254.169.254/latest due to Non-global IP address detected: 169.254.169.254"));
    }

    #[tokio::test]
    async fn test_rendered_redirect_is_allowed_when_guard_disabled() {
        let mut session = session(ScriptedRenderer::default());
        let result = session
            .fetch(&Url::parse("http://93.184.216.34/metadata").unwrap())
            .await
            .unwrap();
        assert!(result.redirected());
        assert_eq!(result.final_url.as_str(), "http://169.254.169.254/latest");
    }

    #[tokio::test]
    async fn test_pdf_redirect_to_internal_address_is_rejected() {
        let server = MockServer::start().await;
        let port = server.address().port();
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                format!("http://127.0.0.1:{}/final.pdf", port).as_str(),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let renderer = ScriptedRenderer::default();
        let mut session = session_with(renderer.clone(), SsrfGuard::enforcing());
        let requested = Url::parse(&format!("http://localhost:{}/doc.pdf", port)).unwrap();

        let err = page_error(session.fetch(&requested).await.unwrap_err());
        assert_eq!(err.kind, PageErrorKind::UrlValidation);
        assert_eq!(err.url, format!("http://127.0.0.1:{}/final.pdf", port));
        assert!(err.detail.contains("Non-global IP address detected: 127.0.0.1"));
        assert_eq!(renderer.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_release_then_relaunch() {
        let renderer = ScriptedRenderer::default();
        let mut session = session(renderer.clone());

        session.fetch(&url("/a")).await.unwrap();
        session.release().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(renderer.shutdowns.load(Ordering::SeqCst), 1);

        session.fetch(&url("/b")).await.unwrap();
        assert_eq!(session.launches(), 2);
    }

    #[tokio::test]
    async fn test_release_when_stopped_is_noop() {
        let renderer = ScriptedRenderer::default();
        let mut session = session(renderer.clone());
        session.release().await;
        assert_eq!(renderer.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_idle_needs_complete_document_and_quiet_network() {
        let mut idle = IdleTracker::new(2);
        assert!(!idle.observe("loading", 3));
        assert!(!idle.observe("interactive", 3));
        assert!(!idle.observe("complete", 3));
        assert!(idle.observe("complete", 3));
    }

    #[test]
    fn test_idle_restarts_when_resources_keep_loading() {
        let mut idle = IdleTracker::new(2);
        idle.observe("complete", 1);
        idle.observe("complete", 1);
        assert!(!idle.observe("complete", 4));
        assert!(!idle.observe("complete", 4));
        assert!(idle.observe("complete", 4));
    }

    #[test]
    fn test_idle_reset_after_client_side_redirect() {
        let mut idle = IdleTracker::new(1);
        idle.observe("complete", 2);
        assert!(idle.observe("complete", 2));
        idle.reset();
        assert!(!idle.observe("complete", 2));
        assert!(idle.observe("complete", 2));
    }

    #[test]
    fn test_fetch_result_status() {
        let result = FetchResult {
            requested_url: url("/a"),
            final_url: url("/b"),
            status: Some(404),
            content: PageContent::Html(String::new()),
        };
        assert!(result.redirected());
        assert!(result.is_error_status());

        let unknown = FetchResult {
            status: None,
            ..result
        };
        assert!(!unknown.is_error_status());
    }
}
