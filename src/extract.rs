//! Content extraction
//!
//! Pure functions over fetched HTML: archive pages yield the item links
//! (URL, title, thumbnail), detail pages yield the [`Article`] record.
//! Nothing here touches the network, so the crawl driver can call these
//! between fetches without holding parser state across await points.

use crate::url_util::{absolutize, article_id, source_of};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from detail-page extraction
///
/// Treated at item granularity exactly like fetch errors: logged, counted,
/// skipped.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Selector '{0}' matched nothing")]
    SelectorNotFound(String),

    #[error("Content under selector '{selector}' is implausibly short ({len} chars)")]
    EmptyContent { selector: String, len: usize },

    #[error("Invalid CSS selector '{0}'")]
    BadSelector(String),
}

/// Minimum plausible text length for an article body.
const MIN_CONTENT_CHARS: usize = 20;

/// Titles shorter than this are discarded as boilerplate.
const MIN_TITLE_CHARS: usize = 6;

/// Attributes probed for a thumbnail URL, in order. Lazy-loading themes
/// stash the real source in data-* attributes.
const IMAGE_SRC_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original", "data-lazy"];

/// One link block found on an archive page
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveItem {
    pub url: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// One extracted article, as written to the output artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Hex SHA-256 of the canonical item URL; stable across runs
    pub id: String,
    pub title: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Raw HTML inside the content selector, unprocessed
    pub raw_html_content: String,
    /// Capture date, YYYY-MM-DD
    pub scraped_date: String,
    /// Origin (`scheme://host`) of the article URL
    pub source_url: Option<String>,
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::BadSelector(selector.to_string()))
}

fn clean_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts archive items from an archive/list page, in document order.
/// Items without a usable link are skipped; duplicates within the page are
/// kept (the pagination controller removes them).
pub fn archive_items(
    html: &str,
    base_url: &str,
    item_selector: &str,
    thumbnail_selector: &str,
) -> Result<Vec<ArchiveItem>, ExtractError> {
    let item_sel = parse_selector(item_selector)?;
    let thumb_sel = parse_selector(thumbnail_selector)?;
    let link_sel = parse_selector("a[href]")?;

    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&item_sel) {
        // The matched element may itself be the link, or contain one.
        let link = if element.value().name() == "a" && element.value().attr("href").is_some() {
            Some(element)
        } else {
            element.select(&link_sel).next()
        };
        let Some(link) = link else {
            tracing::debug!("archive item without a link, skipping");
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = absolutize(base_url, href) else {
            tracing::debug!(href, "unresolvable archive link, skipping");
            continue;
        };

        items.push(ArchiveItem {
            url,
            title: best_item_title(element, link),
            thumbnail_url: thumbnail_from(element, &thumb_sel, base_url),
        });
    }

    Ok(items)
}

/// Prefers a headline element's text over the bare link text when it is
/// longer; archive links frequently wrap an image with no text at all.
fn best_item_title(item: ElementRef<'_>, link: ElementRef<'_>) -> String {
    let mut title = clean_text(link);
    for candidate in ["h1", "h2", "h3", ".title", ".headline", ".post-title"] {
        let Ok(sel) = Selector::parse(candidate) else {
            continue;
        };
        if let Some(found) = item.select(&sel).next() {
            let text = clean_text(found);
            if text.len() > title.len() {
                title = text;
                break;
            }
        }
    }
    title
}

fn thumbnail_from(item: ElementRef<'_>, thumb_sel: &Selector, base_url: &str) -> Option<String> {
    let image = item.select(thumb_sel).next()?;
    for attr in IMAGE_SRC_ATTRS {
        if let Some(value) = image.value().attr(attr) {
            if let Some(url) = absolutize(base_url, value) {
                return Some(url);
            }
        }
    }
    None
}

/// Extracts an article from a detail page.
///
/// The raw HTML inside the content selector is captured unprocessed; text
/// cleaning is a downstream concern.
pub fn article(html: &str, url: &str, content_selector: &str) -> Result<Article, ExtractError> {
    let content_sel = parse_selector(content_selector)?;
    let document = Html::parse_document(html);

    let content = document
        .select(&content_sel)
        .next()
        .ok_or_else(|| ExtractError::SelectorNotFound(content_selector.to_string()))?;

    let text_len = clean_text(content).chars().count();
    if text_len < MIN_CONTENT_CHARS {
        return Err(ExtractError::EmptyContent {
            selector: content_selector.to_string(),
            len: text_len,
        });
    }

    Ok(Article {
        id: article_id(url),
        title: page_title(&document, content),
        url: url.to_string(),
        thumbnail_url: None,
        raw_html_content: content.html(),
        scraped_date: Utc::now().format("%Y-%m-%d").to_string(),
        source_url: source_of(url),
    })
}

/// Title candidates in order of reliability: og:title, twitter:title, the
/// first h1, a h1 inside the content block, then the document title.
fn page_title(document: &Html, content: ElementRef<'_>) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();

    for meta in ["meta[property=\"og:title\"]", "meta[name=\"twitter:title\"]"] {
        if let Ok(sel) = Selector::parse(meta) {
            if let Some(el) = document.select(&sel).next() {
                if let Some(content) = el.value().attr("content") {
                    candidates.push(content.split_whitespace().collect::<Vec<_>>().join(" "));
                }
            }
        }
    }
    if let Ok(h1) = Selector::parse("h1") {
        if let Some(el) = document.select(&h1).next() {
            candidates.push(clean_text(el));
        }
        if let Some(el) = content.select(&h1).next() {
            candidates.push(clean_text(el));
        }
    }
    if let Ok(title) = Selector::parse("title") {
        if let Some(el) = document.select(&title).next() {
            candidates.push(clean_text(el));
        }
    }

    candidates
        .into_iter()
        .find(|t| t.trim().len() >= MIN_TITLE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE_PAGE: &str = r#"
        <html><body>
        <div class="post">
            <a href="/articles/first"><img src="/thumbs/1.jpg"></a>
            <h2>First headline on the page</h2>
        </div>
        <div class="post">
            <a href="https://example.com/articles/second">Second story</a>
        </div>
        <div class="post"><span>no link here</span></div>
        </body></html>
    "#;

    #[test]
    fn archive_items_resolve_links_in_document_order() {
        let items =
            archive_items(ARCHIVE_PAGE, "https://example.com/news", "div.post", "img").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://example.com/articles/first");
        assert_eq!(items[1].url, "https://example.com/articles/second");
    }

    #[test]
    fn archive_items_prefer_headline_over_link_text() {
        let items =
            archive_items(ARCHIVE_PAGE, "https://example.com/news", "div.post", "img").unwrap();
        assert_eq!(items[0].title, "First headline on the page");
        assert_eq!(items[1].title, "Second story");
    }

    #[test]
    fn archive_items_pick_up_thumbnails() {
        let items =
            archive_items(ARCHIVE_PAGE, "https://example.com/news", "div.post", "img").unwrap();
        assert_eq!(
            items[0].thumbnail_url.as_deref(),
            Some("https://example.com/thumbs/1.jpg")
        );
        assert_eq!(items[1].thumbnail_url, None);
    }

    #[test]
    fn archive_items_read_lazy_image_attributes() {
        let html = r#"<div class="post"><a href="/a"><img data-lazy-src="/t.png"></a></div>"#;
        let items = archive_items(html, "https://example.com/c", "div.post", "img").unwrap();
        assert_eq!(
            items[0].thumbnail_url.as_deref(),
            Some("https://example.com/t.png")
        );
    }

    #[test]
    fn article_extracts_raw_html_and_title() {
        let html = r#"
            <html><head>
            <meta property="og:title" content="The real headline">
            <title>Site | The real headline</title>
            </head><body>
            <div id="body"><p>Enough words here to count as a plausible article body.</p></div>
            </body></html>
        "#;
        let article = article(html, "https://example.com/articles/first#frag", "#body").unwrap();
        assert_eq!(article.title.as_deref(), Some("The real headline"));
        assert!(article.raw_html_content.contains("<p>"));
        assert_eq!(article.source_url.as_deref(), Some("https://example.com"));
        // Fragment must not change identity.
        assert_eq!(
            article.id,
            crate::url_util::article_id("https://example.com/articles/first")
        );
    }

    #[test]
    fn article_rejects_missing_selector() {
        let err = article("<html><body></body></html>", "https://example.com/a", "#nope")
            .unwrap_err();
        assert!(matches!(err, ExtractError::SelectorNotFound(_)));
    }

    #[test]
    fn article_rejects_implausibly_short_content() {
        let err = article(
            r#"<div id="body">hi</div>"#,
            "https://example.com/a",
            "#body",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyContent { .. }));
    }
}
