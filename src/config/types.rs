use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Main configuration structure for Sumi-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub forum: ForumConfig,
}

/// How the crawler walks outward from the seed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlMode {
    /// Index everything reachable on the seed's origin
    Recursive,
    /// Index only the seed page
    Single,
    /// The seed is a sitemap.xml; index every page it lists
    Sitemap,
    /// The seed is a local file with one URL per line
    UrlList,
    /// The seed is a forum board; index every thread on every listing page
    ForumBoard,
    /// The seed is a single forum thread; index every page of it
    ForumThread,
}

impl CrawlMode {
    /// Returns true for the paginated forum strategies
    pub fn is_forum(&self) -> bool {
        matches!(self, Self::ForumBoard | Self::ForumThread)
    }

    /// Returns true if pages fetched in this mode contribute new links
    pub fn follows_links(&self) -> bool {
        matches!(self, Self::Recursive)
    }

    /// Converts to the kebab-case name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Single => "single",
            Self::Sitemap => "sitemap",
            Self::UrlList => "url-list",
            Self::ForumBoard => "forum-board",
            Self::ForumThread => "forum-thread",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crawl target and traversal behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Seed URL (or, for `url-list`, the path of the URL file)
    pub seed_url: String,

    /// Traversal mode
    pub mode: CrawlMode,

    /// Number of documents handed downstream per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Strip common documentation-site chrome in addition to the structural noise tags
    #[serde(default = "default_true")]
    pub apply_boilerplate_cleanup: bool,

    /// Reject URLs that resolve to non-global addresses
    #[serde(default = "default_true")]
    pub enforce_ssrf_guard: bool,

    /// Extra element names removed before text extraction
    #[serde(default = "default_noise_tags")]
    pub additional_noise_tags: Vec<String>,

    /// Drop `#fragment` from discovered links before deduplication
    #[serde(default = "default_true")]
    pub strip_fragments: bool,
}

/// Which rendering back-end fetches HTML pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RendererKind {
    /// Plain HTTP; no page scripts are executed
    Http,
    /// Headless Chromium (requires the `chromium` feature)
    Chromium,
}

/// Network behavior for plain and rendered fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for plain requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for one rendered navigation, including the idle waits (seconds)
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Rendering back-end for HTML pages
    #[serde(default = "default_renderer")]
    pub renderer: RendererKind,

    /// Static headers added to every request, e.g. a pre-issued bearer token
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            navigation_timeout_secs: default_navigation_timeout(),
            renderer: default_renderer(),
            extra_headers: HashMap::new(),
        }
    }
}

/// CSS selectors for forum markup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ForumConfig {
    /// Page-number controls in the pagination bar
    #[serde(default = "default_page_nav_selector")]
    pub page_nav_selector: String,

    /// Thread title containers on a board listing page
    #[serde(default = "default_thread_title_selector")]
    pub thread_title_selector: String,

    /// The page-level thread title
    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    /// One element per post
    #[serde(default = "default_post_selector")]
    pub post_selector: String,

    /// Post body inside a post element
    #[serde(default = "default_post_body_selector")]
    pub post_body_selector: String,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            page_nav_selector: default_page_nav_selector(),
            thread_title_selector: default_thread_title_selector(),
            title_selector: default_title_selector(),
            post_selector: default_post_selector(),
            post_body_selector: default_post_body_selector(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    16
}

fn default_noise_tags() -> Vec<String> {
    vec!["section".to_string()]
}

fn default_user_agent() -> String {
    format!("SumiSieve/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    10
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_renderer() -> RendererKind {
    RendererKind::Http
}

fn default_page_nav_selector() -> String {
    "li.pageNav-page".to_string()
}

fn default_thread_title_selector() -> String {
    ".structItem-title".to_string()
}

fn default_title_selector() -> String {
    "h1.p-title-value".to_string()
}

fn default_post_selector() -> String {
    "article.message".to_string()
}

fn default_post_body_selector() -> String {
    "div.message-main".to_string()
}
