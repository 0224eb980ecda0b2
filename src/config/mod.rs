//! Configuration module
//!
//! Loads, parses, and validates TOML configuration files, and resolves each
//! configured category into an immutable [`CrawlSpec`].

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    CategoryConfig, Config, CrawlConfig, CrawlSpec, DelayPolicy, EngineKind, IdentityConfig,
    OutputConfig, OutputFormat, PaginationKind, SiteConfig,
};
pub use validation::{validate, validate_resume};
