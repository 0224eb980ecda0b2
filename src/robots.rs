//! Robots.txt checking with a per-origin cache
//!
//! The check is advisory and configurable: when `respect-robots` is off in
//! the crawl config, no robots.txt is ever fetched. Fetch failures default
//! to allow, matching common crawler practice for sites without a
//! robots.txt.

use crate::url_util::origin_of;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::Duration;

/// Caches raw robots.txt bodies per origin for the lifetime of a run.
pub struct RobotsCache {
    client: reqwest::Client,
    /// origin -> robots.txt body; `None` body means "could not fetch,
    /// allow everything"
    cache: HashMap<String, Option<String>>,
}

impl RobotsCache {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Whether the given URL may be fetched.
    pub async fn allowed(&mut self, url: &str, user_agent: &str) -> bool {
        let Some(origin) = origin_of(url) else {
            return true;
        };

        if !self.cache.contains_key(&origin) {
            let body = self.fetch_robots(&origin).await;
            self.cache.insert(origin.clone(), body);
        }

        match self.cache.get(&origin).and_then(|b| b.as_deref()) {
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, user_agent, url)
            }
            None => true,
        }
    }

    async fn fetch_robots(&self, origin: &str) -> Option<String> {
        let robots_url = format!("{}/robots.txt", origin);
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                tracing::debug!(origin, status = %response.status(), "no usable robots.txt");
                None
            }
            Err(e) => {
                tracing::debug!(origin, error = %e, "robots.txt fetch failed, allowing");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn disallow_rule_is_honored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private/\n"),
            )
            .mount(&server)
            .await;

        let mut cache = RobotsCache::new(Duration::from_secs(5));
        assert!(
            !cache
                .allowed(&format!("{}/private/x", server.uri()), "papertrail")
                .await
        );
        assert!(
            cache
                .allowed(&format!("{}/public/x", server.uri()), "papertrail")
                .await
        );
    }

    #[tokio::test]
    async fn unfetchable_robots_defaults_to_allow() {
        let mut cache = RobotsCache::new(Duration::from_millis(200));
        assert!(
            cache
                .allowed("http://127.0.0.1:1/whatever", "papertrail")
                .await
        );
    }
}
