//! URL helpers shared across the crawler
//!
//! Canonicalization here is deliberately light: article identity must be
//! stable across runs, so we only strip the pieces that never change page
//! content (the fragment), rather than rewriting query strings.

use sha2::{Digest, Sha256};
use url::Url;

/// Resolves a possibly-relative link against its page URL.
pub fn absolutize(base: &str, link: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let joined = base.join(link.trim()).ok()?;
    Some(joined.to_string())
}

/// Canonical form of an item URL: parsed, fragment removed.
///
/// Falls back to the trimmed input when the URL does not parse, so that a
/// malformed href still yields a deterministic identifier.
pub fn canonicalize(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Derives the stable article identifier for an item URL.
///
/// The id is the hex-encoded SHA-256 of the canonical URL. Resume and
/// re-scrape rely on this being a pure function of the URL.
pub fn article_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(url).as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracts the `scheme://host` origin of a URL, used as `source_url`.
pub fn source_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}

/// Extracts `scheme://host[:port]`, the base a robots.txt lives under.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Some(format!("{}://{}", parsed.scheme(), host)),
    }
}
