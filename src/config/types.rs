use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for papertrail
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryConfig>,
}

/// Site identification
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Slug used for derived file names (URL manifests, logs)
    pub name: String,
}

/// Crawl behavior configuration, applied to every category unless the
/// category overrides a field
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Delay between any two network fetches
    #[serde(default)]
    pub delay: DelayPolicy,

    /// Per-fetch timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pages (and probe fetches) with less content than this are treated
    /// as blocked or empty. One threshold serves both the engine heuristic
    /// and the paginator's thin-page rule.
    #[serde(rename = "min-content-bytes", default = "default_min_content_bytes")]
    pub min_content_bytes: usize,

    /// Minimum archive-item matches for an engine probe to pass
    #[serde(rename = "min-probe-matches", default = "default_min_probe_matches")]
    pub min_probe_matches: usize,

    /// Whether to check robots.txt before fetching
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Whether to draw a proxy from the identity pool for each request
    #[serde(rename = "use-proxy", default)]
    pub use_proxy: bool,

    /// Engine to use unconditionally, skipping the probe
    #[serde(rename = "force-engine", default)]
    pub force_engine: Option<EngineKind>,

    /// WebDriver endpoint for the full-browser-driver engine
    #[serde(rename = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_content_bytes() -> usize {
    1000
}

fn default_min_probe_matches() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the output artifact
    pub path: String,

    /// On-disk shape of the artifact
    #[serde(default)]
    pub format: OutputFormat,
}

/// On-disk shape of the output artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON record per line, appendable
    #[default]
    Ndjson,
    /// A single JSON array, rewritten on each append
    Json,
}

/// Identity rotation inputs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IdentityConfig {
    /// Extra user agents mixed into the built-in pool
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,

    /// Proxy candidates as `host:port`
    #[serde(default)]
    pub proxies: Vec<String>,
}

/// One archive/category to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,

    /// URL of the archive/list page (must not be the site root)
    #[serde(rename = "archive-url")]
    pub archive_url: String,

    /// CSS selector identifying each article link block on the archive page
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// CSS selector identifying the article main content on detail pages
    #[serde(rename = "content-selector")]
    pub content_selector: String,

    /// Selector for the thumbnail image within an archive item
    #[serde(rename = "thumbnail-selector", default = "default_thumbnail_selector")]
    pub thumbnail_selector: String,

    /// Pagination strategy name: none | queryparam | click | scroll
    #[serde(default = "default_pagination")]
    pub pagination: String,

    /// Strategy parameter: a page template like `?page={n}` for queryparam,
    /// or the button selector for click
    #[serde(rename = "pagination-param", default)]
    pub pagination_param: Option<String>,

    /// Hard ceiling on pages visited; 0 or absent means unlimited
    #[serde(rename = "page-limit", default)]
    pub page_limit: u32,

    /// Per-category engine override
    #[serde(rename = "force-engine", default)]
    pub force_engine: Option<EngineKind>,
}

fn default_thumbnail_selector() -> String {
    "img".to_string()
}

fn default_pagination() -> String {
    "none".to_string()
}

/// Delay policy between two network fetches
///
/// `delay = 1.5` sleeps exactly 1.5s; `delay = [0.5, 1.5]` draws a fresh
/// uniform value per fetch; absent means no delay.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DelayPolicy {
    Fixed(f64),
    Range(f64, f64),
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Fixed(0.0)
    }
}

/// Fetch mechanism identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Direct HTTP request, no script execution
    Http,
    /// Headless Chromium via the DevTools protocol
    Browser,
    /// External browser driven over the WebDriver protocol
    Webdriver,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Http => write!(f, "http"),
            EngineKind::Browser => write!(f, "browser"),
            EngineKind::Webdriver => write!(f, "webdriver"),
        }
    }
}

/// Pagination strategy with its parameter resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationKind {
    /// Exactly one page
    None,
    /// Page n's URL is derived from a template containing `{n}`
    QueryParam { template: String },
    /// One document progressively extended by clicking a control
    Click { button: String },
    /// Declared but intentionally unimplemented
    Scroll,
}

impl PaginationKind {
    /// Whether page identity is a pure function of the page index.
    /// Only such strategies can resume at an arbitrary page.
    pub fn supports_cursor(&self) -> bool {
        matches!(self, PaginationKind::QueryParam { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaginationKind::None => "none",
            PaginationKind::QueryParam { .. } => "queryparam",
            PaginationKind::Click { .. } => "click",
            PaginationKind::Scroll => "scroll",
        }
    }
}

/// Immutable per-category crawl settings, resolved from the config before
/// crawling begins
#[derive(Debug, Clone)]
pub struct CrawlSpec {
    pub category: String,
    pub archive_url: String,
    pub item_selector: String,
    pub content_selector: String,
    pub thumbnail_selector: String,
    pub pagination: PaginationKind,
    pub page_limit: u32,
    pub delay: DelayPolicy,
    pub timeout: Duration,
    pub min_content_bytes: usize,
    pub min_probe_matches: usize,
    pub respect_robots: bool,
    pub use_proxy: bool,
    pub forced_engine: Option<EngineKind>,
    pub webdriver_url: String,
}

impl Config {
    /// Resolves one category into its immutable [`CrawlSpec`].
    ///
    /// The pagination string/param pair has already been validated, so an
    /// unknown strategy here is a programming error, not user input.
    pub fn resolve(&self, category: &CategoryConfig) -> CrawlSpec {
        let pagination = match category.pagination.as_str() {
            "queryparam" => PaginationKind::QueryParam {
                template: category.pagination_param.clone().unwrap_or_default(),
            },
            "click" => PaginationKind::Click {
                button: category.pagination_param.clone().unwrap_or_default(),
            },
            "scroll" => PaginationKind::Scroll,
            _ => PaginationKind::None,
        };

        CrawlSpec {
            category: category.name.clone(),
            archive_url: category.archive_url.clone(),
            item_selector: category.item_selector.clone(),
            content_selector: category.content_selector.clone(),
            thumbnail_selector: category.thumbnail_selector.clone(),
            pagination,
            page_limit: category.page_limit,
            delay: self.crawl.delay,
            timeout: Duration::from_secs(self.crawl.timeout_secs),
            min_content_bytes: self.crawl.min_content_bytes,
            min_probe_matches: self.crawl.min_probe_matches,
            respect_robots: self.crawl.respect_robots,
            use_proxy: self.crawl.use_proxy,
            forced_engine: category.force_engine.or(self.crawl.force_engine),
            webdriver_url: self.crawl.webdriver_url.clone(),
        }
    }
}
