//! Output storage
//!
//! Append-only writers for discovered articles in two on-disk shapes:
//! one record per line (NDJSON) or a single JSON array. Both expose the
//! same narrow contract the crawl driver needs: `exists(id)` and
//! `append(article)`.

mod json_array;
mod ndjson;

pub use json_array::JsonArrayStore;
pub use ndjson::NdjsonStore;

use crate::config::OutputFormat;
use crate::extract::Article;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Existing artifact is not a JSON array: {0}")]
    NotAnArray(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for output artifact writers
pub trait ArticleStore {
    /// Whether an article with this identifier is already in the artifact
    /// (loaded at open or appended this run).
    fn exists(&self, id: &str) -> bool;

    /// Appends one article. The record must be durable when this returns.
    fn append(&mut self, article: &Article) -> StorageResult<()>;

    /// Number of identifiers known to the store.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens the store matching the configured output format.
pub fn open_store(path: &Path, format: OutputFormat) -> StorageResult<Box<dyn ArticleStore>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(match format {
        OutputFormat::Ndjson => Box::new(NdjsonStore::open(path)?),
        OutputFormat::Json => Box::new(JsonArrayStore::open(path)?),
    })
}

#[cfg(test)]
pub(crate) fn sample_article(url: &str) -> Article {
    Article {
        id: crate::url_util::article_id(url),
        title: Some("A title".to_string()),
        url: url.to_string(),
        thumbnail_url: None,
        raw_html_content: "<p>body</p>".to_string(),
        scraped_date: "2026-01-01".to_string(),
        source_url: Some("https://example.com".to_string()),
    }
}
