//! Engine selection
//!
//! On first use for a category, engines are probed in the fixed preference
//! order {Http, Browser, WebDriver} against the category's archive page:
//! the first engine whose fetch yields at least `min-probe-matches` item
//! matches is locked in for the rest of the run. A forced engine skips the
//! probe entirely and its failures are never downgraded to another engine.

use crate::config::{CrawlSpec, EngineKind, PaginationKind};
use crate::engine::{
    BrowserEngine, Engine, FetchError, FetchOptions, HttpEngine, WebDriverEngine,
};
use scraper::{Html, Selector};
use thiserror::Error;

/// Errors from engine selection; fatal for the affected category only
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(
        "No engine found at least {min_matches} match(es) for selector '{selector}' on '{url}'. \
         Make sure the URL is a category/archive page and the selector is correct."
    )]
    NoEngineQualified {
        url: String,
        selector: String,
        min_matches: usize,
    },

    #[error("Forced engine '{kind}' failed to initialize: {source}")]
    ForcedEngineFailed {
        kind: EngineKind,
        source: FetchError,
    },
}

/// Counts archive-item selector matches in rendered HTML.
///
/// An unparseable selector counts as zero matches; selectors are validated
/// at config load, so this only happens for probes driven by tests.
pub fn count_matches(html: &str, selector: &str) -> usize {
    let Ok(parsed) = Selector::parse(selector) else {
        return 0;
    };
    Html::parse_document(html).select(&parsed).count()
}

const PROBE_ORDER: [EngineKind; 3] = [EngineKind::Http, EngineKind::Browser, EngineKind::Webdriver];

/// Resolves the engine for one category run.
///
/// `opts` carries the identity the probe fetches (and a browser launch)
/// should use; the probe is a real fetch of the archive page and doubles
/// as archive validation.
pub async fn choose_engine(
    spec: &CrawlSpec,
    opts: &FetchOptions,
) -> Result<Engine, SelectionError> {
    if let Some(kind) = spec.forced_engine {
        tracing::info!(category = %spec.category, engine = %kind, "using forced engine");
        return build_engine(kind, spec, opts)
            .await
            .map_err(|source| SelectionError::ForcedEngineFailed { kind, source });
    }

    // Click pagination needs an engine that can drive interactions, so
    // the plain HTTP engine is not a candidate for those categories.
    let candidates: &[EngineKind] = if matches!(spec.pagination, PaginationKind::Click { .. }) {
        &PROBE_ORDER[1..]
    } else {
        &PROBE_ORDER
    };

    for &kind in candidates {
        tracing::info!(category = %spec.category, engine = %kind, "probing engine");
        let engine = match build_engine(kind, spec, opts).await {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(engine = %kind, error = %e, "engine unavailable, trying next");
                continue;
            }
        };

        match engine.fetch(&spec.archive_url, opts).await {
            Ok(page) => {
                let matches = count_matches(&page.html, &spec.item_selector);
                if matches >= spec.min_probe_matches {
                    tracing::info!(
                        category = %spec.category,
                        engine = %kind,
                        matches,
                        "engine selected"
                    );
                    return Ok(engine);
                }
                tracing::warn!(
                    engine = %kind,
                    matches,
                    required = spec.min_probe_matches,
                    "probe found too few archive items"
                );
            }
            Err(e) => {
                tracing::warn!(engine = %kind, error = %e, "probe fetch failed");
            }
        }
        engine.shutdown().await;
    }

    Err(SelectionError::NoEngineQualified {
        url: spec.archive_url.clone(),
        selector: spec.item_selector.clone(),
        min_matches: spec.min_probe_matches,
    })
}

async fn build_engine(
    kind: EngineKind,
    spec: &CrawlSpec,
    opts: &FetchOptions,
) -> Result<Engine, FetchError> {
    Ok(match kind {
        EngineKind::Http => Engine::Http(HttpEngine::new(spec.timeout)?),
        EngineKind::Browser => Engine::Browser(BrowserEngine::launch(opts).await?),
        EngineKind::Webdriver => {
            Engine::WebDriver(WebDriverEngine::new(&spec.webdriver_url, spec.timeout)?)
        }
    })
}
