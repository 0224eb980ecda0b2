//! Per-category crawl execution
//!
//! One category is crawled by a single logical thread of control: archive
//! pages are walked sequentially (each page's existence depends on
//! observing the previous one), item URLs are grouped per page, then each
//! page batch's detail pages are fetched, extracted, and stored. The page
//! index is committed to the ledger only after every item on that page has
//! been attempted, so an interruption never marks partial pages done.

use crate::config::{CrawlSpec, PaginationKind};
use crate::crawl::delay::Throttle;
use crate::crawl::RunContext;
use crate::engine::{choose_engine, Engine, FetchError, FetchOptions, ListingSession};
use crate::extract::{self, ArchiveItem};
use crate::pagination::{Observed, PageObservation, PageRequest, Paginator, Step};
use crate::url_util::article_id;
use crate::{Result, ScrapeError};
use std::collections::HashMap;

/// User agent presented to robots.txt, independent of the rotated headers.
const ROBOTS_AGENT: &str = "papertrail";

/// Per-category counters, aggregated into the end-of-run summary
#[derive(Debug, Default, Clone)]
pub struct CrawlStats {
    pub pages_visited: u32,
    pub items_discovered: usize,
    pub articles_attempted: usize,
    pub articles_saved: usize,
    pub articles_skipped: usize,
    pub articles_failed: usize,
}

impl CrawlStats {
    pub fn absorb(&mut self, other: &CrawlStats) {
        self.pages_visited += other.pages_visited;
        self.items_discovered += other.items_discovered;
        self.articles_attempted += other.articles_attempted;
        self.articles_saved += other.articles_saved;
        self.articles_skipped += other.articles_skipped;
        self.articles_failed += other.articles_failed;
    }
}

/// Outcome of one category's crawl
#[derive(Debug)]
pub struct CategoryReport {
    pub name: String,
    pub stats: CrawlStats,
    /// Present when the category failed outright (selection failure,
    /// unreachable archive); sibling categories continue regardless
    pub error: Option<String>,
}

/// Item URLs discovered on one archive page, kept per page so the resume
/// cursor only ever advances over fully attempted pages
struct PageBatch {
    page: u32,
    items: Vec<ArchiveItem>,
}

/// Crawls one category; never propagates category-level failures.
pub(crate) async fn crawl_category(
    spec: &CrawlSpec,
    start_page: u32,
    ctx: &mut RunContext<'_>,
) -> CategoryReport {
    let mut runner = CategoryRunner {
        spec,
        ctx,
        stats: CrawlStats::default(),
        throttle: Throttle::new(spec.delay),
    };
    let error = match runner.run(start_page).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(category = %spec.category, error = %e, "category failed");
            Some(e.to_string())
        }
    };
    CategoryReport {
        name: spec.category.clone(),
        stats: runner.stats,
        error,
    }
}

struct CategoryRunner<'a, 'b> {
    spec: &'a CrawlSpec,
    ctx: &'a mut RunContext<'b>,
    stats: CrawlStats,
    throttle: Throttle,
}

impl CategoryRunner<'_, '_> {
    async fn run(&mut self, start_page: u32) -> Result<()> {
        let spec = self.spec;
        tracing::info!(
            category = %spec.category,
            url = %spec.archive_url,
            pagination = spec.pagination.label(),
            start_page,
            "starting category crawl"
        );

        // Scroll is rejected here, before any fetch.
        let mut paginator = Paginator::new(
            spec.pagination.clone(),
            &spec.archive_url,
            start_page,
            spec.page_limit,
            spec.min_content_bytes,
        )?;

        if spec.respect_robots
            && !self
                .ctx
                .robots
                .allowed(&spec.archive_url, ROBOTS_AGENT)
                .await
        {
            return Err(ScrapeError::RobotsDenied {
                url: spec.archive_url.clone(),
            });
        }

        // The probe fetch doubles as archive validation.
        self.throttle.pause().await;
        let engine = choose_engine(spec, &self.fetch_options(0)).await?;

        let batches = match &spec.pagination {
            PaginationKind::Click { button } => {
                let button = button.clone();
                self.collect_click(&engine, &mut paginator, &button).await?
            }
            _ => self.collect_pages(&engine, &mut paginator).await?,
        };

        self.stats.items_discovered = batches.iter().map(|b| b.items.len()).sum();
        tracing::info!(
            category = %spec.category,
            pages = batches.len(),
            items = self.stats.items_discovered,
            "archive walk finished"
        );

        self.write_manifest(&batches);
        self.process_batches(&engine, batches).await?;
        engine.shutdown().await;
        Ok(())
    }

    /// Fresh per-request identity, drawn from the pools the driver owns.
    fn fetch_options(&mut self, min_content_bytes: usize) -> FetchOptions {
        FetchOptions {
            timeout: self.spec.timeout,
            min_content_bytes,
            headers: self.ctx.header_pool.next_set(),
            proxy: if self.spec.use_proxy {
                self.ctx.proxy_pool.next_proxy()
            } else {
                None
            },
        }
    }

    fn note_proxy_failure(&mut self, opts: &FetchOptions, error: &FetchError) {
        if let Some(proxy) = &opts.proxy {
            if matches!(
                error,
                FetchError::Network { .. } | FetchError::Timeout { .. }
            ) {
                self.ctx.proxy_pool.mark_failed(proxy);
            }
        }
    }

    /// Walks queryparam/none pagination: fetch, observe, follow the next
    /// URL until the controller reports exhaustion.
    async fn collect_pages(
        &mut self,
        engine: &Engine,
        paginator: &mut Paginator,
    ) -> Result<Vec<PageBatch>> {
        let mut batches = Vec::new();
        let PageRequest::Url(mut url) = paginator.initial_request() else {
            unreachable!("non-click strategies always start from a URL");
        };

        loop {
            self.throttle.pause().await;
            let (observation, mut by_url) = self.fetch_archive(engine, &url).await;
            self.stats.pages_visited += 1;

            let observed = paginator.observe(observation);
            batches.push(batch_from(&observed, &mut by_url));

            match observed.step {
                Step::Next(PageRequest::Url(next)) => url = next,
                Step::Next(PageRequest::ClickMore) => {
                    unreachable!("click requests only come from click strategies")
                }
                Step::Exhausted(reason) => {
                    tracing::info!(category = %self.spec.category, page = observed.page, %reason, "pagination exhausted");
                    break;
                }
            }
        }
        Ok(batches)
    }

    /// Walks click pagination: one open document, observed after the
    /// initial load and after every click.
    async fn collect_click(
        &mut self,
        engine: &Engine,
        paginator: &mut Paginator,
        button: &str,
    ) -> Result<Vec<PageBatch>> {
        self.throttle.pause().await;
        let opts = self.fetch_options(0);
        let session = engine
            .open_listing(&self.spec.archive_url, button, &opts)
            .await?;

        let batches = self.drive_click_session(&session, paginator).await;
        session.close().await;
        Ok(batches)
    }

    async fn drive_click_session(
        &mut self,
        session: &ListingSession,
        paginator: &mut Paginator,
    ) -> Vec<PageBatch> {
        let mut batches = Vec::new();
        loop {
            let observation = match session.html().await {
                Ok(html) => self.observe_html(&html, &self.spec.archive_url),
                Err(e) => {
                    tracing::warn!(error = %e, "listing snapshot failed");
                    (PageObservation::failed(), HashMap::new())
                }
            };
            let (observation, mut by_url) = observation;
            self.stats.pages_visited += 1;

            let observed = paginator.observe(observation);
            batches.push(batch_from(&observed, &mut by_url));

            match observed.step {
                Step::Exhausted(reason) => {
                    tracing::info!(category = %self.spec.category, %reason, "click pagination exhausted");
                    break;
                }
                Step::Next(_) => {
                    self.throttle.pause().await;
                    match session.click_more().await {
                        Ok(true) => continue,
                        Ok(false) => {
                            tracing::info!(category = %self.spec.category, "load-more control gone");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "click failed, stopping pagination");
                            break;
                        }
                    }
                }
            }
        }
        batches
    }

    /// Fetches one archive page and reduces it to a pagination observation
    /// plus a URL-to-item map for the fresh batch.
    async fn fetch_archive(
        &mut self,
        engine: &Engine,
        url: &str,
    ) -> (PageObservation, HashMap<String, ArchiveItem>) {
        let opts = self.fetch_options(0);
        match engine.fetch(url, &opts).await {
            Ok(page) => self.observe_html(&page.html, url),
            Err(e) if e.is_not_found() => {
                tracing::debug!(url, "archive page not found");
                (PageObservation::not_found(), HashMap::new())
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "archive page fetch failed");
                self.note_proxy_failure(&opts, &e);
                (PageObservation::failed(), HashMap::new())
            }
        }
    }

    fn observe_html(
        &self,
        html: &str,
        base_url: &str,
    ) -> (PageObservation, HashMap<String, ArchiveItem>) {
        let items = match extract::archive_items(
            html,
            base_url,
            &self.spec.item_selector,
            &self.spec.thumbnail_selector,
        ) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "archive extraction failed");
                Vec::new()
            }
        };

        let urls: Vec<String> = items.iter().map(|item| item.url.clone()).collect();
        let mut by_url = HashMap::new();
        for item in items {
            by_url.entry(item.url.clone()).or_insert(item);
        }
        (PageObservation::ok(urls, html.len()), by_url)
    }

    /// Detail phase: page batch by page batch, committing the cursor after
    /// each fully attempted batch. A single item's failure never aborts
    /// the category.
    async fn process_batches(&mut self, engine: &Engine, batches: Vec<PageBatch>) -> Result<()> {
        for batch in batches {
            for item in &batch.items {
                let id = article_id(&item.url);
                if self.ctx.existing.contains(&id) || self.ctx.store.exists(&id) {
                    tracing::debug!(url = %item.url, "already stored, skipping");
                    self.stats.articles_skipped += 1;
                    continue;
                }
                if self.spec.respect_robots
                    && !self.ctx.robots.allowed(&item.url, ROBOTS_AGENT).await
                {
                    tracing::debug!(url = %item.url, "disallowed by robots.txt, skipping");
                    self.stats.articles_skipped += 1;
                    continue;
                }

                self.stats.articles_attempted += 1;
                self.throttle.pause().await;
                match self.fetch_and_store(engine, item).await {
                    Ok(()) => self.stats.articles_saved += 1,
                    Err(e) => {
                        tracing::warn!(url = %item.url, error = %e, "article failed, skipping");
                        self.stats.articles_failed += 1;
                    }
                }
            }
            self.ctx.ledger.commit(&self.spec.category, batch.page)?;
        }
        Ok(())
    }

    async fn fetch_and_store(&mut self, engine: &Engine, item: &ArchiveItem) -> Result<()> {
        let opts = self.fetch_options(self.spec.min_content_bytes);
        let page = match engine.fetch(&item.url, &opts).await {
            Ok(page) => page,
            Err(e) => {
                self.note_proxy_failure(&opts, &e);
                return Err(e.into());
            }
        };

        let mut article = extract::article(&page.html, &item.url, &self.spec.content_selector)?;
        if article.title.is_none() && !item.title.is_empty() {
            article.title = Some(item.title.clone());
        }
        article.thumbnail_url = item.thumbnail_url.clone();

        self.ctx.store.append(&article)?;
        tracing::debug!(url = %item.url, "article saved");
        Ok(())
    }

    /// Saves the discovered URL list next to the output artifact so the
    /// detail phase can be re-run without walking the archive again.
    fn write_manifest(&self, batches: &[PageBatch]) {
        let urls: Vec<&str> = batches
            .iter()
            .flat_map(|b| b.items.iter().map(|i| i.url.as_str()))
            .collect();
        if urls.is_empty() {
            return;
        }
        let manifest = serde_json::json!({
            "archive_url": self.spec.archive_url,
            "item_selector": self.spec.item_selector,
            "content_selector": self.spec.content_selector,
            "total_urls": urls.len(),
            "urls": urls,
        });
        let path = self.ctx.manifest_path(&self.spec.category);
        match serde_json::to_string_pretty(&manifest) {
            Ok(rendered) => {
                if let Err(e) = std::fs::write(&path, rendered) {
                    tracing::warn!(path = %path.display(), error = %e, "could not write URL manifest");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not render URL manifest"),
        }
    }
}

fn batch_from(observed: &Observed, by_url: &mut HashMap<String, ArchiveItem>) -> PageBatch {
    let items = observed
        .fresh
        .iter()
        .filter_map(|url| by_url.remove(url))
        .collect();
    PageBatch {
        page: observed.page,
        items,
    }
}
