//! Crawl orchestration
//!
//! [`run_crawl`] is the main entry point: it resolves the categories to
//! visit, prepares storage, the resume state, and the identity pools, then
//! drives each category sequentially. Category failures are isolated into
//! the run summary; only configuration problems abort the whole run.

mod delay;
mod driver;

pub use driver::{CategoryReport, CrawlStats};

use crate::config::{self, Config};
use crate::identity::{HeaderPool, ProxyPool};
use crate::resume::{scan_existing_ids, CursorLedger, ResumeMode};
use crate::robots::RobotsCache;
use crate::storage::{open_store, ArticleStore};
use crate::{ConfigError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run-level options resolved from the CLI
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Categories to crawl; empty means all configured categories
    pub categories: Vec<String>,
    pub resume: ResumeMode,
}

/// End-of-run summary across all categories
#[derive(Debug)]
pub struct RunSummary {
    pub categories: Vec<CategoryReport>,
}

impl RunSummary {
    pub fn totals(&self) -> CrawlStats {
        let mut totals = CrawlStats::default();
        for report in &self.categories {
            totals.absorb(&report.stats);
        }
        totals
    }

    pub fn failed_categories(&self) -> Vec<&CategoryReport> {
        self.categories
            .iter()
            .filter(|r| r.error.is_some())
            .collect()
    }
}

/// Shared run state handed to each category crawl.
///
/// The pools are owned here and passed down per request; each category's
/// mutable crawl state (paginator, ledger entry) has exactly one owner at
/// a time, so nothing needs locking.
pub(crate) struct RunContext<'a> {
    pub header_pool: HeaderPool,
    pub proxy_pool: ProxyPool,
    pub robots: RobotsCache,
    pub store: &'a mut dyn ArticleStore,
    pub existing: HashSet<String>,
    pub ledger: CursorLedger,
    manifest_dir: PathBuf,
    site: String,
}

impl RunContext<'_> {
    pub fn manifest_path(&self, category: &str) -> PathBuf {
        self.manifest_dir
            .join(format!("{}_{}_urls.json", self.site, category))
    }
}

/// Runs the crawl described by the configuration.
pub async fn run_crawl(config: &Config, options: RunOptions) -> Result<RunSummary> {
    config::validate_resume(config, &options.resume)?;

    let selected = select_categories(config, &options)?;

    let output_path = PathBuf::from(&config.output.path);
    let mut store = open_store(&output_path, config.output.format)?;

    let existing = match &options.resume {
        ResumeMode::File(path) => scan_existing_ids(path)?,
        _ => HashSet::new(),
    };

    let mut ctx = RunContext {
        header_pool: HeaderPool::new(&config.identity.user_agents),
        proxy_pool: ProxyPool::new(&config.identity.proxies),
        robots: RobotsCache::new(Duration::from_secs(config.crawl.timeout_secs)),
        store: store.as_mut(),
        existing,
        ledger: CursorLedger::load(&CursorLedger::sidecar_for(&output_path)),
        manifest_dir: manifest_dir_for(&output_path),
        site: config.site.name.clone(),
    };

    let mut reports = Vec::new();
    for category in selected {
        let spec = config.resolve(category);
        let start_page = start_page_for(&spec, &options.resume, &ctx.ledger);

        if options.resume == ResumeMode::Fresh {
            ctx.ledger.clear(&spec.category)?;
        }

        let report = driver::crawl_category(&spec, start_page, &mut ctx).await;
        reports.push(report);
    }

    let summary = RunSummary {
        categories: reports,
    };
    log_summary(&summary);
    Ok(summary)
}

/// Picks the categories for this run, honoring CLI selection and cursor
/// skipping: a `category,page` cursor skips every category before the
/// target and starts the target at the given page.
fn select_categories<'a>(
    config: &'a Config,
    options: &RunOptions,
) -> Result<Vec<&'a config::CategoryConfig>> {
    let mut selected: Vec<&config::CategoryConfig> = if options.categories.is_empty() {
        config.categories.iter().collect()
    } else {
        let selected: Vec<_> = config
            .categories
            .iter()
            .filter(|c| options.categories.contains(&c.name))
            .collect();
        for requested in &options.categories {
            if !selected.iter().any(|c| &c.name == requested) {
                return Err(ConfigError::Validation(format!(
                    "unknown category '{}'",
                    requested
                ))
                .into());
            }
        }
        selected
    };

    if let ResumeMode::Cursor { category, .. } = &options.resume {
        let Some(index) = selected.iter().position(|c| &c.name == category) else {
            return Err(ConfigError::IncompatibleResume(format!(
                "resume category '{}' is not part of this run",
                category
            ))
            .into());
        };
        if index > 0 {
            tracing::info!(
                skipped = index,
                target = %category,
                "cursor resume: skipping categories before the target"
            );
        }
        selected.drain(..index);
    }

    Ok(selected)
}

/// Starting page for a category under the active resume mode.
///
/// Only queryparam pagination has an index-pure page identity, so the
/// ledger position is ignored for other strategies; their already-saved
/// items dedup by identifier instead.
fn start_page_for(spec: &config::CrawlSpec, resume: &ResumeMode, ledger: &CursorLedger) -> u32 {
    match resume {
        ResumeMode::Cursor {
            category: target,
            page,
        } if target == &spec.category => *page,
        ResumeMode::Cursor { .. } => 1,
        // File-based resume also picks up the ledger position from the
        // interrupted run; item dedup covers anything re-fetched.
        ResumeMode::File(_) if spec.pagination.supports_cursor() => ledger
            .last_completed(&spec.category)
            .map_or(1, |done| done + 1),
        ResumeMode::File(_) => 1,
        ResumeMode::Fresh => 1,
    }
}

fn manifest_dir_for(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn log_summary(summary: &RunSummary) {
    for report in &summary.categories {
        match &report.error {
            Some(error) => tracing::warn!(
                category = %report.name,
                error = %error,
                saved = report.stats.articles_saved,
                "category finished with error"
            ),
            None => tracing::info!(
                category = %report.name,
                pages = report.stats.pages_visited,
                discovered = report.stats.items_discovered,
                saved = report.stats.articles_saved,
                skipped = report.stats.articles_skipped,
                failed = report.stats.articles_failed,
                "category finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlSpec, DelayPolicy, PaginationKind};
    use std::time::Duration;

    fn spec(name: &str, pagination: PaginationKind) -> CrawlSpec {
        CrawlSpec {
            category: name.to_string(),
            archive_url: format!("https://example.com/{}", name),
            item_selector: "div.post a".to_string(),
            content_selector: "div.body".to_string(),
            thumbnail_selector: "img".to_string(),
            pagination,
            page_limit: 0,
            delay: DelayPolicy::Fixed(0.0),
            timeout: Duration::from_secs(5),
            min_content_bytes: 0,
            min_probe_matches: 1,
            respect_robots: false,
            use_proxy: false,
            forced_engine: None,
            webdriver_url: "http://localhost:9515".to_string(),
        }
    }

    fn queryparam(name: &str) -> CrawlSpec {
        spec(
            name,
            PaginationKind::QueryParam {
                template: "?page={n}".to_string(),
            },
        )
    }

    #[test]
    fn start_page_honors_cursor_for_target_only() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CursorLedger::load(&dir.path().join("cursor.json"));
        let cursor = ResumeMode::Cursor {
            category: "cat2".to_string(),
            page: 3,
        };
        assert_eq!(start_page_for(&queryparam("cat2"), &cursor, &ledger), 3);
        assert_eq!(start_page_for(&queryparam("cat3"), &cursor, &ledger), 1);
    }

    #[test]
    fn start_page_uses_ledger_under_file_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        let mut ledger = CursorLedger::load(&path);
        ledger.commit("politics", 4).unwrap();

        let resume = ResumeMode::File(dir.path().join("out.jsonl"));
        assert_eq!(start_page_for(&queryparam("politics"), &resume, &ledger), 5);
        assert_eq!(start_page_for(&queryparam("sports"), &resume, &ledger), 1);
        assert_eq!(
            start_page_for(&queryparam("politics"), &ResumeMode::Fresh, &ledger),
            1
        );
    }

    #[test]
    fn ledger_start_only_applies_to_queryparam() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = CursorLedger::load(&dir.path().join("cursor.json"));
        ledger.commit("latest", 3).unwrap();

        let resume = ResumeMode::File(dir.path().join("out.jsonl"));
        let single_page = spec("latest", PaginationKind::None);
        assert_eq!(start_page_for(&single_page, &resume, &ledger), 1);
    }
}
