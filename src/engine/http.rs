//! Plain HTTP fetch engine
//!
//! The fastest engine and the first one probed. It cannot execute page
//! scripts, so sites that assemble their archive client-side will fail its
//! probe and fall through to a browser engine.

use crate::engine::{FetchError, FetchOptions, FetchedPage};
use reqwest::Client;
use std::time::Duration;

/// Builds the shared HTTP client.
///
/// Redirects are followed (bounded); compression is negotiated by the
/// client, which is why rotated header sets carry no Accept-Encoding.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

pub struct HttpEngine {
    client: Client,
}

impl HttpEngine {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = build_http_client(timeout).map_err(|e| FetchError::Network {
            url: String::new(),
            message: format!("failed to build HTTP client: {}", e),
        })?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, FetchError> {
        // The proxy is a per-request decision made by the caller, but
        // reqwest fixes proxies at client construction; a proxied request
        // gets its own short-lived client.
        let response = match &opts.proxy {
            Some(proxy) => {
                let proxied = Client::builder()
                    .timeout(opts.timeout)
                    .connect_timeout(Duration::from_secs(10))
                    .redirect(reqwest::redirect::Policy::limited(10))
                    .gzip(true)
                    .brotli(true)
                    .proxy(
                        reqwest::Proxy::all(format!("http://{}", proxy)).map_err(|e| {
                            FetchError::Network {
                                url: url.to_string(),
                                message: format!("invalid proxy '{}': {}", proxy, e),
                            }
                        })?,
                    )
                    .build()
                    .map_err(|e| FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;
                self.send(&proxied, url, opts).await?
            }
            None => self.send(&self.client, url, opts).await?,
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        opts.check_min_content(url, &html)?;

        Ok(FetchedPage {
            final_url,
            status: Some(status.as_u16()),
            html,
        })
    }

    async fn send(
        &self,
        client: &Client,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = client.get(url);
        for (name, value) in &opts.headers {
            request = request.header(name, value);
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> FetchOptions {
        FetchOptions::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn fetch_returns_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&server)
            .await;

        let engine = HttpEngine::new(Duration::from_secs(5)).unwrap();
        let page = engine
            .fetch(&format!("{}/page", server.uri()), &options())
            .await
            .unwrap();
        assert_eq!(page.status, Some(200));
        assert!(page.html.contains("hello"));
    }

    #[tokio::test]
    async fn fetch_sends_rotated_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("User-Agent", "TestAgent/9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let engine = HttpEngine::new(Duration::from_secs(5)).unwrap();
        let mut opts = options();
        opts.headers = vec![("User-Agent".to_string(), "TestAgent/9".to_string())];
        let page = engine
            .fetch(&format!("{}/page", server.uri()), &opts)
            .await
            .unwrap();
        assert!(page.html.contains("ok"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let engine = HttpEngine::new(Duration::from_secs(5)).unwrap();
        let err = engine
            .fetch(&format!("{}/missing", server.uri()), &options())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn thin_content_is_an_error_when_threshold_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let engine = HttpEngine::new(Duration::from_secs(5)).unwrap();
        let mut opts = options();
        opts.min_content_bytes = 1000;
        let err = engine
            .fetch(&format!("{}/thin", server.uri()), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ThinContent { .. }));
    }
}
