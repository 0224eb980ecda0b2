//! Identity rotation pools
//!
//! Proxies and request headers are varied across requests to reduce
//! blocking. Both pools are plain objects owned by the crawl driver and
//! handed down per request; engines never reach into them, and no global
//! state is involved.

use rand::Rng;
use std::collections::HashSet;

/// Built-in user agents covering the common browser/OS pairs.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ACCEPT_VALUES: &[&str] = &[
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
];

const ACCEPT_LANGUAGE_VALUES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-US,en;q=0.9,my;q=0.8",
    "en-GB,en;q=0.9,en-US;q=0.8",
    "my-MM,my;q=0.9,en;q=0.8",
];

/// Cycles through user agents and varies the secondary headers per request.
#[derive(Debug)]
pub struct HeaderPool {
    user_agents: Vec<String>,
    next: usize,
}

impl HeaderPool {
    /// Builds a pool from the built-in agents plus any configured extras.
    pub fn new(extra_user_agents: &[String]) -> Self {
        let mut user_agents: Vec<String> =
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect();
        user_agents.extend(extra_user_agents.iter().cloned());
        Self {
            user_agents,
            next: 0,
        }
    }

    /// Returns the next header set: user agent cycled, secondary headers
    /// drawn fresh.
    ///
    /// Accept-Encoding is deliberately absent; the HTTP client negotiates
    /// compression itself.
    pub fn next_set(&mut self) -> Vec<(String, String)> {
        let user_agent = self.user_agents[self.next % self.user_agents.len()].clone();
        self.next = self.next.wrapping_add(1);

        let mut rng = rand::thread_rng();
        let accept = ACCEPT_VALUES[rng.gen_range(0..ACCEPT_VALUES.len())];
        let language = ACCEPT_LANGUAGE_VALUES[rng.gen_range(0..ACCEPT_LANGUAGE_VALUES.len())];
        let mut headers = vec![
            ("User-Agent".to_string(), user_agent),
            ("Accept".to_string(), accept.to_string()),
            ("Accept-Language".to_string(), language.to_string()),
            (
                "Upgrade-Insecure-Requests".to_string(),
                "1".to_string(),
            ),
        ];
        if rng.gen_bool(0.5) {
            headers.push(("DNT".to_string(), "1".to_string()));
        }
        headers
    }
}

/// Round-robin proxy pool with failure deprioritization.
///
/// Candidates come from the configuration. A proxy marked failed is skipped
/// on subsequent rotations; when every candidate has failed the pool yields
/// `None` and requests go direct.
#[derive(Debug)]
pub struct ProxyPool {
    proxies: Vec<String>,
    failed: HashSet<String>,
    next: usize,
}

impl ProxyPool {
    pub fn new(proxies: &[String]) -> Self {
        Self {
            proxies: proxies.to_vec(),
            failed: HashSet::new(),
            next: 0,
        }
    }

    /// Returns the next healthy proxy, or `None` when none remain.
    pub fn next_proxy(&mut self) -> Option<String> {
        let total = self.proxies.len();
        for _ in 0..total {
            let candidate = self.proxies[self.next % total].clone();
            self.next = self.next.wrapping_add(1);
            if !self.failed.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Deprioritizes a proxy after a failed request through it.
    pub fn mark_failed(&mut self, proxy: &str) {
        tracing::debug!(proxy, "marking proxy as failed");
        self.failed.insert(proxy.to_string());
    }

    pub fn healthy_count(&self) -> usize {
        self.proxies
            .iter()
            .filter(|p| !self.failed.contains(*p))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_pool_cycles_user_agents() {
        let mut pool = HeaderPool::new(&[]);
        let first = pool.next_set();
        let second = pool.next_set();
        let ua = |set: &[(String, String)]| {
            set.iter()
                .find(|(k, _)| k == "User-Agent")
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_ne!(ua(&first), ua(&second));
    }

    #[test]
    fn header_pool_includes_custom_agents() {
        let custom = vec!["TestAgent/1.0".to_string()];
        let mut pool = HeaderPool::new(&custom);
        let agents: Vec<String> = (0..DEFAULT_USER_AGENTS.len() + 1)
            .map(|_| {
                pool.next_set()
                    .into_iter()
                    .find(|(k, _)| k == "User-Agent")
                    .map(|(_, v)| v)
                    .unwrap()
            })
            .collect();
        assert!(agents.iter().any(|a| a == "TestAgent/1.0"));
    }

    #[test]
    fn proxy_pool_rotates_and_skips_failed() {
        let mut pool = ProxyPool::new(&[
            "1.1.1.1:80".to_string(),
            "2.2.2.2:80".to_string(),
        ]);
        assert_eq!(pool.next_proxy().as_deref(), Some("1.1.1.1:80"));
        assert_eq!(pool.next_proxy().as_deref(), Some("2.2.2.2:80"));
        pool.mark_failed("1.1.1.1:80");
        assert_eq!(pool.next_proxy().as_deref(), Some("2.2.2.2:80"));
        assert_eq!(pool.healthy_count(), 1);
    }

    #[test]
    fn proxy_pool_empty_when_all_failed() {
        let mut pool = ProxyPool::new(&["1.1.1.1:80".to_string()]);
        pool.mark_failed("1.1.1.1:80");
        assert_eq!(pool.next_proxy(), None);
    }

    #[test]
    fn proxy_pool_handles_no_candidates() {
        let mut pool = ProxyPool::new(&[]);
        assert_eq!(pool.next_proxy(), None);
        assert_eq!(pool.healthy_count(), 0);
    }
}
