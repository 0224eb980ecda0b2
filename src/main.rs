//! Papertrail main entry point
//!
//! Command-line interface for the resumable archive scraper.

use clap::Parser;
use papertrail::config::load_config_with_hash;
use papertrail::{run_crawl, ResumeMode, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Papertrail: a resumable archive scraper for news sites
///
/// Crawls the archive pages described by a TOML configuration, follows
/// their pagination, and appends every discovered article to the output
/// artifact. Interrupted runs resume with `--resume`.
#[derive(Parser, Debug)]
#[command(name = "papertrail")]
#[command(version)]
#[command(about = "Resumable archive scraper for news sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only these categories (repeatable); default is all
    #[arg(short, long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Resume a previous run: either a path to an existing output
    /// artifact, or an explicit `category,page` cursor
    #[arg(long, value_name = "PATH|CATEGORY,PAGE")]
    resume: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let resume = cli
        .resume
        .as_deref()
        .map(ResumeMode::parse)
        .unwrap_or_default();

    if cli.dry_run {
        handle_dry_run(&config, &resume);
        return Ok(());
    }

    let options = RunOptions {
        categories: cli.categories,
        resume,
    };

    let summary = run_crawl(&config, options).await?;
    print_summary(&summary);

    if summary.failed_categories().len() == summary.categories.len() {
        return Err("every category failed".into());
    }
    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("papertrail=info,warn"),
            1 => EnvFilter::new("papertrail=debug,info"),
            2 => EnvFilter::new("papertrail=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the resolved crawl plan without fetching
fn handle_dry_run(config: &papertrail::Config, resume: &ResumeMode) {
    println!("=== Papertrail Dry Run ===\n");

    println!("Site: {}", config.site.name);
    println!("Output: {} ({:?})", config.output.path, config.output.format);
    println!("Timeout: {}s", config.crawl.timeout_secs);
    println!("Min content bytes: {}", config.crawl.min_content_bytes);
    println!("Respect robots.txt: {}", config.crawl.respect_robots);
    println!("Use proxy pool: {}", config.crawl.use_proxy);
    match resume {
        ResumeMode::Fresh => println!("Resume: fresh run"),
        ResumeMode::File(path) => println!("Resume: from artifact {}", path.display()),
        ResumeMode::Cursor { category, page } => {
            println!("Resume: cursor at {},{}", category, page)
        }
    }

    println!("\nCategories ({}):", config.categories.len());
    for category in &config.categories {
        let spec = config.resolve(category);
        println!("  - {} ({})", spec.category, spec.archive_url);
        println!("    pagination: {}", spec.pagination.label());
        if spec.page_limit > 0 {
            println!("    page limit: {}", spec.page_limit);
        }
        if let Some(engine) = spec.forced_engine {
            println!("    forced engine: {}", engine);
        }
    }

    println!("\n✓ Configuration is valid");
}

fn print_summary(summary: &papertrail::RunSummary) {
    let totals = summary.totals();
    println!("\n=== Crawl Summary ===");
    println!("Categories: {}", summary.categories.len());
    println!("Archive pages visited: {}", totals.pages_visited);
    println!("Items discovered: {}", totals.items_discovered);
    println!("Articles attempted: {}", totals.articles_attempted);
    println!("Articles saved: {}", totals.articles_saved);
    println!("Articles skipped: {}", totals.articles_skipped);
    println!("Articles failed: {}", totals.articles_failed);

    let failed = summary.failed_categories();
    if !failed.is_empty() {
        println!("\nCategories with errors:");
        for report in failed {
            println!("  - {}: {}", report.name, report.error.as_deref().unwrap_or(""));
        }
    }
}
