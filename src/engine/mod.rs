//! Fetch engine set
//!
//! Three interchangeable transport strategies behind one capability: given
//! a URL, return rendered HTML or fail.
//!
//! * [`HttpEngine`] — direct HTTP request; fastest; cannot execute page
//!   scripts.
//! * [`BrowserEngine`] — headless Chromium over the DevTools protocol;
//!   executes scripts and can click controls.
//! * [`WebDriverEngine`] — an external browser spoken to over the W3C
//!   WebDriver wire protocol; the last-resort fallback for sites that
//!   detect the DevTools renderer.
//!
//! Identity rotation decisions (proxy, headers) are made by the caller and
//! arrive through [`FetchOptions`]; engines never consult the pools.

mod browser;
mod http;
mod select;
mod webdriver;

pub use browser::{BrowserEngine, BrowserListing};
pub use http::{build_http_client, HttpEngine};
pub use select::{choose_engine, count_matches, SelectionError};
pub use webdriver::{DriverListing, WebDriverEngine};

use crate::config::EngineKind;
use std::time::Duration;
use thiserror::Error;

/// Errors shared by all fetch engines
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Content below threshold for {url}: {len} < {min} bytes, likely blocked or empty")]
    ThinContent { url: String, len: usize, min: usize },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Engine '{0}' cannot drive page interactions")]
    InteractionUnsupported(EngineKind),
}

impl FetchError {
    /// Whether this failure looks like a not-found page rather than a
    /// transport problem. The pagination controller uses this to end a
    /// queryparam walk cleanly.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::HttpStatus { status: 404, .. })
    }
}

/// Per-request parameters, assembled by the caller
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Rendered content shorter than this fails with [`FetchError::ThinContent`];
    /// 0 disables the check (archive pages are judged by the paginator instead)
    pub min_content_bytes: usize,
    /// Header set from the rotation pool, User-Agent first by convention
    pub headers: Vec<(String, String)>,
    /// Proxy as `host:port`, already chosen by the caller
    pub proxy: Option<String>,
}

impl FetchOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            min_content_bytes: 0,
            headers: Vec::new(),
            proxy: None,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
            .map(|(_, value)| value.as_str())
    }

    /// Applies the minimum-size heuristic shared by every engine.
    pub(crate) fn check_min_content(&self, url: &str, html: &str) -> Result<(), FetchError> {
        if self.min_content_bytes > 0 && html.len() < self.min_content_bytes {
            return Err(FetchError::ThinContent {
                url: url.to_string(),
                len: html.len(),
                min: self.min_content_bytes,
            });
        }
        Ok(())
    }
}

/// One successfully rendered page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects, when the transport reports it
    pub final_url: String,
    /// HTTP status; browser engines surface no status code
    pub status: Option<u16>,
    pub html: String,
}

/// The resolved fetch engine for one category run.
///
/// A tagged variant rather than a trait object: the set of engines is
/// closed and the listing-session types differ per engine.
pub enum Engine {
    Http(HttpEngine),
    Browser(BrowserEngine),
    WebDriver(WebDriverEngine),
}

impl Engine {
    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::Http(_) => EngineKind::Http,
            Engine::Browser(_) => EngineKind::Browser,
            Engine::WebDriver(_) => EngineKind::Webdriver,
        }
    }

    /// Fetches one page. Every engine honors the timeout and the
    /// minimum-content heuristic in `opts`.
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, FetchError> {
        match self {
            Engine::Http(e) => e.fetch(url, opts).await,
            Engine::Browser(e) => e.fetch(url, opts).await,
            Engine::WebDriver(e) => e.fetch(url, opts).await,
        }
    }

    /// Releases engine resources (the browser process, when there is one).
    pub async fn shutdown(self) {
        if let Engine::Browser(browser) = self {
            browser.shutdown().await;
        }
    }

    /// Opens an interactive listing document for click pagination.
    ///
    /// Only the script-capable engines can do this; the plain HTTP engine
    /// reports [`FetchError::InteractionUnsupported`].
    pub async fn open_listing(
        &self,
        url: &str,
        button_selector: &str,
        opts: &FetchOptions,
    ) -> Result<ListingSession, FetchError> {
        match self {
            Engine::Http(_) => Err(FetchError::InteractionUnsupported(EngineKind::Http)),
            Engine::Browser(e) => Ok(ListingSession::Browser(
                e.open_listing(url, button_selector, opts).await?,
            )),
            Engine::WebDriver(e) => Ok(ListingSession::Driver(
                e.open_listing(url, button_selector, opts).await?,
            )),
        }
    }
}

/// An open listing document being extended by "load more" clicks
pub enum ListingSession {
    Browser(BrowserListing),
    Driver(DriverListing),
}

impl ListingSession {
    /// Current HTML of the whole document, including appended items.
    pub async fn html(&self) -> Result<String, FetchError> {
        match self {
            ListingSession::Browser(s) => s.html().await,
            ListingSession::Driver(s) => s.html().await,
        }
    }

    /// Clicks the configured control once. Returns `false` when the
    /// control is no longer present (the feed is finished).
    pub async fn click_more(&self) -> Result<bool, FetchError> {
        match self {
            ListingSession::Browser(s) => s.click_more().await,
            ListingSession::Driver(s) => s.click_more().await,
        }
    }

    /// Releases the underlying page/session.
    pub async fn close(self) {
        match self {
            ListingSession::Browser(s) => s.close().await,
            ListingSession::Driver(s) => s.close().await,
        }
    }
}
