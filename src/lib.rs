//! Papertrail: a resumable archive scraper for news sites
//!
//! This crate crawls list/archive pages of news sites, follows their
//! pagination (URL parameter, "load more" button, or none), fetches each
//! discovered article page, and appends the extracted content to an
//! append-only output file. Interrupted runs can be resumed without
//! re-fetching completed work.

pub mod config;
pub mod crawl;
pub mod engine;
pub mod extract;
pub mod identity;
pub mod pagination;
pub mod resume;
pub mod robots;
pub mod storage;
pub mod url_util;

use thiserror::Error;

/// Main error type for papertrail operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine selection error: {0}")]
    Selection(#[from] engine::SelectionError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] engine::FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDenied { url: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are always fatal: a configuration problem is surfaced before any
/// network activity and no partial run is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}' for {field}")]
    InvalidSelector { field: String, selector: String },

    #[error("Pagination strategy '{0}' is not supported")]
    UnsupportedPagination(String),

    #[error("Incompatible resume request: {0}")]
    IncompatibleResume(String),
}

/// Result type alias for papertrail operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, CrawlSpec, EngineKind, OutputFormat, PaginationKind};
pub use crawl::{run_crawl, RunOptions, RunSummary};
pub use resume::ResumeMode;
