//! Pagination controller
//!
//! A state machine over the pagination strategies. The crawl driver fetches
//! pages and feeds each [`PageObservation`] in; the controller answers with
//! the next page request or the reason the category is exhausted, and emits
//! the net-new item URLs after cross-page de-duplication.
//!
//! States are {Active, Exhausted}. The controller owns all termination
//! logic so the driver never branches on strategy internals.

use crate::config::PaginationKind;
use crate::ConfigError;
use std::collections::HashSet;

/// Pages below the content threshold this many times in a row end a
/// queryparam crawl; guards against soft-404 pages served with HTTP 200.
const THIN_PAGE_RUN: u32 = 2;

/// Clicks yielding zero net-new URLs this many times in a row end a click
/// crawl.
const NO_PROGRESS_RUN: u32 = 2;

/// Hard ceiling on pages visited in unlimited mode.
const SAFETY_CEILING: u32 = 1000;

/// What the driver observed on one archive page (or click snapshot)
#[derive(Debug, Clone)]
pub struct PageObservation {
    pub status: PageStatus,
    /// Item URLs in document order; may contain duplicates
    pub items: Vec<String>,
    /// Raw page size in bytes
    pub content_bytes: usize,
}

impl PageObservation {
    pub fn ok(items: Vec<String>, content_bytes: usize) -> Self {
        Self {
            status: PageStatus::Ok,
            items,
            content_bytes,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: PageStatus::NotFound,
            items: Vec::new(),
            content_bytes: 0,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: PageStatus::Failed,
            items: Vec::new(),
            content_bytes: 0,
        }
    }
}

/// Engine-level outcome of the page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    /// The server said the page does not exist
    NotFound,
    /// The fetch failed (network, timeout, blocked)
    Failed,
}

/// Controller's answer to an observation
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Next(PageRequest),
    Exhausted(ExhaustReason),
}

/// How to obtain the next page
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// Fetch this URL
    Url(String),
    /// Click the configured control on the open listing document
    ClickMore,
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Strategy `none`: exactly one page
    SinglePage,
    /// The server reported the page missing
    NotFound,
    /// A page yielded zero items
    NoItems,
    /// Consecutive pages below the content threshold
    ThinPages,
    /// Consecutive clicks yielded nothing new
    NoProgress,
    /// The configured page limit was reached
    PageLimit,
    /// The unlimited-mode safety ceiling was reached
    SafetyCeiling,
    /// The page fetch failed
    FetchFailed,
}

impl std::fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ExhaustReason::SinglePage => "single page strategy",
            ExhaustReason::NotFound => "page not found",
            ExhaustReason::NoItems => "page yielded no items",
            ExhaustReason::ThinPages => "consecutive thin pages",
            ExhaustReason::NoProgress => "no new items after repeated clicks",
            ExhaustReason::PageLimit => "page limit reached",
            ExhaustReason::SafetyCeiling => "safety ceiling reached",
            ExhaustReason::FetchFailed => "page fetch failed",
        };
        write!(f, "{}", text)
    }
}

/// Result of feeding one observation to the controller
#[derive(Debug, Clone)]
pub struct Observed {
    /// Index of the page this observation belonged to (1-based)
    pub page: u32,
    /// Net-new item URLs, first-seen order preserved
    pub fresh: Vec<String>,
    pub step: Step,
}

/// The pagination state machine for one category crawl.
///
/// Owned exclusively by that category's execution; never shared.
#[derive(Debug)]
pub struct Paginator {
    strategy: PaginationKind,
    base_url: String,
    /// Index of the next page to observe (1-based)
    page: u32,
    page_limit: u32,
    min_content_bytes: usize,
    seen: HashSet<String>,
    thin_run: u32,
    no_progress_run: u32,
    exhausted: bool,
}

impl Paginator {
    /// Creates the controller at the given starting page index.
    ///
    /// Scroll pagination is rejected here, before any fetch: failing fast
    /// preserves the contract for a future implementation instead of
    /// silently behaving like `none`.
    pub fn new(
        strategy: PaginationKind,
        base_url: &str,
        start_page: u32,
        page_limit: u32,
        min_content_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if strategy == PaginationKind::Scroll {
            return Err(ConfigError::UnsupportedPagination("scroll".to_string()));
        }
        Ok(Self {
            strategy,
            base_url: base_url.to_string(),
            page: start_page.max(1),
            page_limit,
            min_content_bytes,
            seen: HashSet::new(),
            thin_run: 0,
            no_progress_run: 0,
            exhausted: false,
        })
    }

    pub fn is_active(&self) -> bool {
        !self.exhausted
    }

    /// The request for the first page of this crawl (the resume index for
    /// queryparam, the archive URL itself otherwise).
    pub fn initial_request(&self) -> PageRequest {
        match &self.strategy {
            PaginationKind::QueryParam { template } => {
                PageRequest::Url(build_page_url(&self.base_url, template, self.page))
            }
            _ => PageRequest::Url(self.base_url.clone()),
        }
    }

    /// Feeds the observation for the current page and advances the machine.
    pub fn observe(&mut self, obs: PageObservation) -> Observed {
        debug_assert!(!self.exhausted, "observe called on exhausted paginator");
        let page = self.page;

        // Cross-page and in-page de-duplication in one pass; an item seen
        // on page N is not re-emitted on page N+1 even if re-listed.
        let mut fresh = Vec::new();
        for url in &obs.items {
            if self.seen.insert(url.clone()) {
                fresh.push(url.clone());
            }
        }

        let step = self.next_step(&obs, fresh.len(), page);
        match &step {
            Step::Next(_) => self.page += 1,
            Step::Exhausted(reason) => {
                tracing::debug!(page, %reason, "pagination exhausted");
                self.exhausted = true;
            }
        }
        Observed { page, fresh, step }
    }

    fn next_step(&mut self, obs: &PageObservation, fresh_count: usize, page: u32) -> Step {
        match obs.status {
            PageStatus::NotFound => return Step::Exhausted(ExhaustReason::NotFound),
            PageStatus::Failed => return Step::Exhausted(ExhaustReason::FetchFailed),
            PageStatus::Ok => {}
        }

        match &self.strategy {
            PaginationKind::None => Step::Exhausted(ExhaustReason::SinglePage),

            PaginationKind::QueryParam { template } => {
                if obs.items.is_empty() {
                    return Step::Exhausted(ExhaustReason::NoItems);
                }
                if self.min_content_bytes > 0 && obs.content_bytes < self.min_content_bytes {
                    self.thin_run += 1;
                    if self.thin_run >= THIN_PAGE_RUN {
                        return Step::Exhausted(ExhaustReason::ThinPages);
                    }
                } else {
                    self.thin_run = 0;
                }
                if let Some(reason) = self.ceiling_hit(page) {
                    return Step::Exhausted(reason);
                }
                Step::Next(PageRequest::Url(build_page_url(
                    &self.base_url,
                    template,
                    page + 1,
                )))
            }

            PaginationKind::Click { .. } => {
                if obs.items.is_empty() {
                    return Step::Exhausted(ExhaustReason::NoItems);
                }
                if fresh_count == 0 {
                    self.no_progress_run += 1;
                    if self.no_progress_run >= NO_PROGRESS_RUN {
                        return Step::Exhausted(ExhaustReason::NoProgress);
                    }
                } else {
                    self.no_progress_run = 0;
                }
                if let Some(reason) = self.ceiling_hit(page) {
                    return Step::Exhausted(reason);
                }
                Step::Next(PageRequest::ClickMore)
            }

            PaginationKind::Scroll => unreachable!("scroll rejected at construction"),
        }
    }

    fn ceiling_hit(&self, page: u32) -> Option<ExhaustReason> {
        if self.page_limit > 0 && page >= self.page_limit {
            Some(ExhaustReason::PageLimit)
        } else if page >= SAFETY_CEILING {
            Some(ExhaustReason::SafetyCeiling)
        } else {
            None
        }
    }
}

/// Derives the URL for page `n` from the archive URL and the template.
///
/// Page 1 is always the archive URL itself. For later pages, `{n}` is
/// substituted into the template; `?`/`&`-prefixed templates extend the
/// query string, anything else is joined onto the path.
fn build_page_url(base_url: &str, template: &str, n: u32) -> String {
    if n <= 1 {
        return base_url.to_string();
    }
    let param = template.replace("{n}", &n.to_string());
    if let Some(rest) = param.strip_prefix('?') {
        if base_url.contains('?') {
            format!("{}&{}", base_url, rest)
        } else {
            format!("{}?{}", base_url, rest)
        }
    } else if param.starts_with('&') {
        format!("{}{}", base_url, param)
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            param.trim_start_matches('/')
        )
    }
}
