//! Full-browser-driver engine: the W3C WebDriver wire protocol
//!
//! Functionally equivalent to the DevTools renderer, but drives an
//! external chromedriver/geckodriver-managed browser. Some sites detect
//! the DevTools automation banner and serve it blocked pages; a real
//! driver session is the last-resort fallback.
//!
//! The protocol is spoken directly over HTTP + JSON rather than through a
//! client crate: the handful of endpoints needed (session, url, source,
//! execute/sync) does not justify one.

use crate::engine::{FetchError, FetchOptions, FetchedPage};
use serde_json::{json, Value};
use std::time::Duration;

fn driver_err(message: impl Into<String>) -> FetchError {
    FetchError::WebDriver(message.into())
}

/// The protocol plumbing, shared between the engine and open sessions.
#[derive(Clone)]
struct Wire {
    endpoint: String,
    http: reqwest::Client,
}

impl Wire {
    /// Issues one protocol command and unwraps the `value` envelope,
    /// surfacing WebDriver-level errors from the body.
    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.clone() }
            } else {
                driver_err(format!("{}: {}", path, e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| driver_err(format!("{}: unreadable response: {}", path, e)))?;
        let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let value = parsed.get("value").cloned().unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown webdriver error");
            return Err(driver_err(format!("{}: {}: {}", path, error, message)));
        }
        if !status.is_success() {
            return Err(driver_err(format!("{}: HTTP {}", path, status.as_u16())));
        }
        Ok(value)
    }

    async fn navigate(&self, session: &str, url: &str) -> Result<(), FetchError> {
        self.command(
            reqwest::Method::POST,
            &format!("session/{}/url", session),
            Some(json!({ "url": url })),
        )
        .await
        .map(|_| ())
    }

    async fn page_source(&self, session: &str) -> Result<String, FetchError> {
        let source = self
            .command(
                reqwest::Method::GET,
                &format!("session/{}/source", session),
                None,
            )
            .await?;
        source
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| driver_err("page source missing from response"))
    }

    async fn delete_session(&self, session: &str) {
        let _ = self
            .command(
                reqwest::Method::DELETE,
                &format!("session/{}", session),
                None,
            )
            .await;
    }
}

pub struct WebDriverEngine {
    wire: Wire,
}

impl WebDriverEngine {
    /// Connects to a WebDriver endpoint (e.g. a local chromedriver).
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            // Session creation spawns a browser; allow it headroom beyond
            // the page timeout.
            .timeout(timeout + Duration::from_secs(15))
            .build()
            .map_err(|e| driver_err(format!("failed to build protocol client: {}", e)))?;
        Ok(Self {
            wire: Wire {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                http,
            },
        })
    }

    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let session = self.create_session(opts).await?;
        let result = async {
            self.wire.navigate(&session, url).await?;
            let html = self.wire.page_source(&session).await?;
            opts.check_min_content(url, &html)?;
            Ok(FetchedPage {
                final_url: url.to_string(),
                status: None,
                html,
            })
        }
        .await;
        self.wire.delete_session(&session).await;
        result
    }

    /// Opens a persistent session for click pagination.
    pub async fn open_listing(
        &self,
        url: &str,
        button_selector: &str,
        opts: &FetchOptions,
    ) -> Result<DriverListing, FetchError> {
        let session = self.create_session(opts).await?;
        if let Err(e) = self.wire.navigate(&session, url).await {
            self.wire.delete_session(&session).await;
            return Err(e);
        }
        Ok(DriverListing {
            wire: self.wire.clone(),
            session,
            button: button_selector.to_string(),
        })
    }

    async fn create_session(&self, opts: &FetchOptions) -> Result<String, FetchError> {
        let caps = capabilities(opts);
        let body = self
            .wire
            .command(reqwest::Method::POST, "session", Some(caps))
            .await?;
        body.get("sessionId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| driver_err("session create response carried no sessionId"))
    }
}

/// Builds W3C capabilities for a headless Chrome session carrying the
/// caller-chosen identity.
fn capabilities(opts: &FetchOptions) -> Value {
    let mut args = vec![
        "--headless=new".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    if let Some(user_agent) = opts.user_agent() {
        args.push(format!("--user-agent={}", user_agent));
    }

    let mut always_match = json!({
        "browserName": "chrome",
        "goog:chromeOptions": { "args": args },
        "timeouts": { "pageLoad": opts.timeout.as_millis() as u64 },
    });
    if let Some(proxy) = &opts.proxy {
        always_match["proxy"] = json!({
            "proxyType": "manual",
            "httpProxy": proxy,
            "sslProxy": proxy,
        });
    }

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// A persistent WebDriver session being extended by "load more" clicks
pub struct DriverListing {
    wire: Wire,
    session: String,
    button: String,
}

impl DriverListing {
    pub async fn html(&self) -> Result<String, FetchError> {
        self.wire.page_source(&self.session).await
    }

    pub async fn click_more(&self) -> Result<bool, FetchError> {
        const CLICK_SCRIPT: &str = "const el = document.querySelector(arguments[0]); \
             if (el === null) { return false; } el.click(); return true;";
        let clicked = self
            .wire
            .command(
                reqwest::Method::POST,
                &format!("session/{}/execute/sync", self.session),
                Some(json!({ "script": CLICK_SCRIPT, "args": [self.button] })),
            )
            .await?;
        if clicked.as_bool() != Some(true) {
            return Ok(false);
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
        Ok(true)
    }

    pub async fn close(self) {
        self.wire.delete_session(&self.session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> FetchOptions {
        FetchOptions::new(Duration::from_secs(5))
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": { "sessionId": "abc123", "capabilities": {} }
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/url"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": null })),
            )
            .mount(server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": null })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_speaks_the_session_protocol() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("GET"))
            .and(path("/session/abc123/source"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "<html><body>rendered</body></html>"
            })))
            .mount(&server)
            .await;

        let engine = WebDriverEngine::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let page = engine
            .fetch("https://example.com/article", &options())
            .await
            .unwrap();
        assert!(page.html.contains("rendered"));

        // The session must have been torn down.
        let requests = server.received_requests().await.unwrap();
        assert!(requests
            .iter()
            .any(|r| r.method.to_string() == "DELETE" && r.url.path() == "/session/abc123"));
    }

    #[tokio::test]
    async fn webdriver_error_bodies_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "value": { "error": "session not created", "message": "no chrome binary" }
            })))
            .mount(&server)
            .await;

        let engine = WebDriverEngine::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = engine
            .fetch("https://example.com/article", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::WebDriver(_)));
        assert!(err.to_string().contains("session not created"));
    }

    #[tokio::test]
    async fn listing_click_reports_missing_control() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/execute/sync"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": false })),
            )
            .mount(&server)
            .await;

        let engine = WebDriverEngine::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let listing = engine
            .open_listing("https://example.com/news", "button.more", &options())
            .await
            .unwrap();
        assert!(!listing.click_more().await.unwrap());
        listing.close().await;
    }
}
