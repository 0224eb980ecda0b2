//! Scripted-renderer engine: headless Chromium over the DevTools protocol
//!
//! Executes page scripts, so archives assembled client-side render before
//! the item selector runs. Also the engine of choice for click pagination:
//! [`BrowserListing`] keeps the document open between clicks so appended
//! items accumulate.
//!
//! Identity caveat: Chromium fixes the proxy and user agent at process
//! launch, so this engine applies the identity it was launched with rather
//! than per-request rotation. The caller supplies that identity once, at
//! construction.

use crate::engine::{FetchError, FetchOptions, FetchedPage};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;

/// Settle time after a click before re-reading the document; load-more
/// handlers need a moment to append their items.
const CLICK_SETTLE: Duration = Duration::from_millis(1000);

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

pub struct BrowserEngine {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl BrowserEngine {
    /// Launches a headless Chromium carrying the given identity.
    pub async fn launch(opts: &FetchOptions) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .request_timeout(opts.timeout);
        if let Some(user_agent) = opts.user_agent() {
            builder = builder.arg(format!("--user-agent={}", user_agent));
        }
        if let Some(proxy) = &opts.proxy {
            builder = builder.arg(format!("--proxy-server=http://{}", proxy));
        }
        let config = builder.build().map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        // The CDP handler must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::debug!("headless browser launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let html = match tokio::time::timeout(opts.timeout, self.render(url)).await {
            Ok(rendered) => rendered?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            }
        };

        opts.check_min_content(url, &html)?;

        Ok(FetchedPage {
            final_url: url.to_string(),
            // CDP navigation does not surface an HTTP status; blocked pages
            // are caught by the content heuristic instead.
            status: None,
            html,
        })
    }

    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let page = self.browser.new_page(url).await.map_err(browser_err)?;
        page.wait_for_navigation().await.map_err(browser_err)?;
        let html = page.content().await.map_err(browser_err)?;
        let _ = page.close().await;
        Ok(html)
    }

    /// Opens the listing document and keeps the page alive for clicking.
    pub async fn open_listing(
        &self,
        url: &str,
        button_selector: &str,
        opts: &FetchOptions,
    ) -> Result<BrowserListing, FetchError> {
        let page = match tokio::time::timeout(opts.timeout, async {
            let page = self.browser.new_page(url).await.map_err(browser_err)?;
            page.wait_for_navigation().await.map_err(browser_err)?;
            Ok::<Page, FetchError>(page)
        })
        .await
        {
            Ok(page) => page?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            }
        };

        Ok(BrowserListing {
            page,
            button: button_selector.to_string(),
            timeout: opts.timeout,
        })
    }

    /// Tears the browser process down cleanly.
    pub async fn shutdown(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

impl Drop for BrowserEngine {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// An open listing page being extended by "load more" clicks
pub struct BrowserListing {
    page: Page,
    button: String,
    timeout: Duration,
}

impl BrowserListing {
    pub async fn html(&self) -> Result<String, FetchError> {
        match tokio::time::timeout(self.timeout, self.page.content()).await {
            Ok(content) => content.map_err(browser_err),
            Err(_) => Err(FetchError::Timeout {
                url: self.page.url().await.ok().flatten().unwrap_or_default(),
            }),
        }
    }

    /// Clicks the control once; `false` means the control is gone.
    pub async fn click_more(&self) -> Result<bool, FetchError> {
        let element = match self.page.find_element(self.button.as_str()).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element.click().await.map_err(browser_err)?;
        tokio::time::sleep(CLICK_SETTLE).await;
        Ok(true)
    }

    pub async fn close(self) {
        let _ = self.page.close().await;
    }
}
