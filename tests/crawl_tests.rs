//! Integration tests for the crawl driver
//!
//! These use wiremock to stand in for a news site and exercise the full
//! cycle: engine probing, pagination, detail fetching, storage, and the
//! two resume paths.

use papertrail::config::load_config;
use papertrail::resume::{CursorLedger, ResumeMode};
use papertrail::{run_crawl, RunOptions};
use std::path::{Path, PathBuf};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    server: MockServer,
    _dir: tempfile::TempDir,
    config_path: PathBuf,
    output_path: PathBuf,
}

/// Writes a config for the mock site. `categories` supplies pre-rendered
/// `[[category]]` TOML blocks.
async fn fixture(categories: &str) -> Fixture {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("out.jsonl");

    let config = format!(
        r#"
[site]
name = "mocknews"

[crawl]
timeout-secs = 5
min-content-bytes = 0
respect-robots = false
webdriver-url = "http://127.0.0.1:1"

[output]
path = "{output}"
format = "ndjson"

{categories}
"#,
        output = output_path.display(),
        categories = categories.replace("{base}", &server.uri()),
    );
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, config).unwrap();

    Fixture {
        server,
        _dir: dir,
        config_path,
        output_path,
    }
}

fn archive_page(item_paths: &[&str]) -> String {
    let items: String = item_paths
        .iter()
        .map(|p| format!(r#"<div class="post"><a href="{}">Story at {}</a></div>"#, p, p))
        .collect();
    format!("<html><body>{}</body></html>", items)
}

fn article_page(title: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <div class="article-body"><h1>{title}</h1>
        <p>Long enough body text for the extractor to accept this page as a real article.</p>
        </div></body></html>"#
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn read_artifact(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

async fn detail_fetch_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/articles/"))
        .count()
}

const NEWS_CATEGORY: &str = r#"
[[category]]
name = "news"
archive-url = "{base}/news"
item-selector = "div.post a"
content-selector = "div.article-body"
pagination = "queryparam"
pagination-param = "/page/{n}"
"#;

#[tokio::test]
async fn full_crawl_walks_pagination_and_stores_articles() {
    let fx = fixture(NEWS_CATEGORY).await;

    mount_page(
        &fx.server,
        "/news",
        archive_page(&["/articles/a1", "/articles/a2"]),
    )
    .await;
    mount_page(&fx.server, "/news/page/2", archive_page(&["/articles/a3"])).await;
    // Page 3 lists nothing: pagination must stop here.
    mount_page(&fx.server, "/news/page/3", archive_page(&[])).await;
    for name in ["a1", "a2", "a3"] {
        mount_page(
            &fx.server,
            &format!("/articles/{}", name),
            article_page(&format!("Article {}", name)),
        )
        .await;
    }

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();

    let totals = summary.totals();
    assert_eq!(totals.pages_visited, 3);
    assert_eq!(totals.items_discovered, 3);
    assert_eq!(totals.articles_saved, 3);
    assert_eq!(totals.articles_failed, 0);
    assert!(summary.failed_categories().is_empty());

    let records = read_artifact(&fx.output_path);
    assert_eq!(records.len(), 3);
    assert!(records[0]["id"].as_str().unwrap().len() == 64);
    assert!(records[0]["raw_html_content"]
        .as_str()
        .unwrap()
        .contains("<p>"));

    // Every fully attempted page is committed, including the empty one.
    let ledger = CursorLedger::load(&CursorLedger::sidecar_for(&fx.output_path));
    assert_eq!(ledger.last_completed("news"), Some(3));
}

#[tokio::test]
async fn page_limit_is_a_hard_ceiling() {
    let limited = format!("{}page-limit = 2\n", NEWS_CATEGORY);
    let fx = fixture(&limited).await;

    mount_page(&fx.server, "/news", archive_page(&["/articles/a1"])).await;
    mount_page(&fx.server, "/news/page/2", archive_page(&["/articles/a2"])).await;
    // Page 3 exists but must never be requested.
    Mock::given(method("GET"))
        .and(path("/news/page/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(archive_page(&["/articles/a3"])))
        .expect(0)
        .mount(&fx.server)
        .await;
    for name in ["a1", "a2"] {
        mount_page(
            &fx.server,
            &format!("/articles/{}", name),
            article_page(name),
        )
        .await;
    }

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();

    assert_eq!(summary.totals().pages_visited, 2);
    assert_eq!(summary.totals().articles_saved, 2);
}

#[tokio::test]
async fn file_resume_performs_zero_detail_fetches() {
    let fx = fixture(NEWS_CATEGORY).await;

    mount_page(
        &fx.server,
        "/news",
        archive_page(&["/articles/a1", "/articles/a2"]),
    )
    .await;
    mount_page(&fx.server, "/news/page/2", archive_page(&[])).await;
    for name in ["a1", "a2"] {
        mount_page(
            &fx.server,
            &format!("/articles/{}", name),
            article_page(name),
        )
        .await;
    }

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.totals().articles_saved, 2);
    let fetches_after_first_run = detail_fetch_count(&fx.server).await;
    assert_eq!(fetches_after_first_run, 2);

    // Drop the cursor sidecar so the second run re-walks the archive from
    // page 1 and resumption rests on identifiers alone.
    std::fs::remove_file(CursorLedger::sidecar_for(&fx.output_path)).unwrap();

    let options = RunOptions {
        categories: Vec::new(),
        resume: ResumeMode::File(fx.output_path.clone()),
    };
    let summary = run_crawl(&config, options).await.unwrap();

    assert_eq!(summary.totals().articles_saved, 0);
    assert_eq!(summary.totals().articles_skipped, 2);
    assert_eq!(detail_fetch_count(&fx.server).await, fetches_after_first_run);

    // The artifact did not grow.
    assert_eq!(read_artifact(&fx.output_path).len(), 2);
}

#[tokio::test]
async fn cursor_resume_skips_prior_categories_and_pages() {
    let categories = r#"
[[category]]
name = "cat1"
archive-url = "{base}/cat1"
item-selector = "div.post a"
content-selector = "div.article-body"
pagination = "queryparam"
pagination-param = "/page/{n}"

[[category]]
name = "cat2"
archive-url = "{base}/cat2"
item-selector = "div.post a"
content-selector = "div.article-body"
pagination = "queryparam"
pagination-param = "/page/{n}"

[[category]]
name = "cat3"
archive-url = "{base}/cat3"
item-selector = "div.post a"
content-selector = "div.article-body"
pagination = "queryparam"
pagination-param = "/page/{n}"
"#;
    let fx = fixture(categories).await;

    // cat1 must never be touched.
    Mock::given(method("GET"))
        .and(path("/cat1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(archive_page(&["/articles/c1"])))
        .expect(0)
        .mount(&fx.server)
        .await;

    // cat2: the engine probe hits the base archive URL, but pagination
    // starts at page 2.
    mount_page(&fx.server, "/cat2", archive_page(&["/articles/c2-old"])).await;
    mount_page(&fx.server, "/cat2/page/2", archive_page(&["/articles/c2"])).await;
    mount_page(&fx.server, "/cat2/page/3", archive_page(&[])).await;

    mount_page(&fx.server, "/cat3", archive_page(&["/articles/c3"])).await;
    mount_page(&fx.server, "/cat3/page/2", archive_page(&[])).await;

    for name in ["c2", "c3"] {
        mount_page(
            &fx.server,
            &format!("/articles/{}", name),
            article_page(name),
        )
        .await;
    }

    let config = load_config(&fx.config_path).unwrap();
    let options = RunOptions {
        categories: Vec::new(),
        resume: ResumeMode::parse("cat2,2"),
    };
    let summary = run_crawl(&config, options).await.unwrap();

    assert_eq!(summary.categories.len(), 2); // cat1 skipped entirely
    assert_eq!(summary.categories[0].name, "cat2");
    assert_eq!(summary.categories[1].name, "cat3");

    let records = read_artifact(&fx.output_path);
    let urls: Vec<&str> = records
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    // c2-old sits on cat2 page 1, which the cursor skipped.
    assert!(urls.iter().any(|u| u.ends_with("/articles/c2")));
    assert!(urls.iter().any(|u| u.ends_with("/articles/c3")));
    assert!(!urls.iter().any(|u| u.ends_with("/articles/c2-old")));
}

#[tokio::test]
async fn cursor_resume_with_click_pagination_is_rejected_before_fetching() {
    let categories = r#"
[[category]]
name = "clicky"
archive-url = "{base}/clicky"
item-selector = "div.post a"
content-selector = "div.article-body"
pagination = "click"
pagination-param = "button.load-more"
"#;
    let fx = fixture(categories).await;

    let config = load_config(&fx.config_path).unwrap();
    let options = RunOptions {
        categories: Vec::new(),
        resume: ResumeMode::parse("clicky,3"),
    };
    let err = run_crawl(&config, options).await.unwrap_err();
    assert!(err.to_string().contains("queryparam"));

    // No network activity happened.
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_category_is_isolated_from_siblings() {
    let categories = r#"
[[category]]
name = "broken"
archive-url = "{base}/broken"
item-selector = "div.post a"
content-selector = "div.article-body"

[[category]]
name = "healthy"
archive-url = "{base}/healthy"
item-selector = "div.post a"
content-selector = "div.article-body"
"#;
    let fx = fixture(categories).await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fx.server)
        .await;
    mount_page(&fx.server, "/healthy", archive_page(&["/articles/h1"])).await;
    mount_page(&fx.server, "/articles/h1", article_page("h1")).await;

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();

    assert_eq!(summary.failed_categories().len(), 1);
    assert_eq!(summary.failed_categories()[0].name, "broken");
    assert_eq!(summary.totals().articles_saved, 1);

    let records = read_artifact(&fx.output_path);
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn item_failure_never_aborts_the_category() {
    let fx = fixture(NEWS_CATEGORY).await;

    mount_page(
        &fx.server,
        "/news",
        archive_page(&["/articles/gone", "/articles/ok"]),
    )
    .await;
    mount_page(&fx.server, "/news/page/2", archive_page(&[])).await;
    Mock::given(method("GET"))
        .and(path("/articles/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fx.server)
        .await;
    mount_page(&fx.server, "/articles/ok", article_page("ok")).await;

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();

    let totals = summary.totals();
    assert_eq!(totals.articles_attempted, 2);
    assert_eq!(totals.articles_saved, 1);
    assert_eq!(totals.articles_failed, 1);
    assert!(summary.failed_categories().is_empty());
}

#[tokio::test]
async fn overlapping_pages_store_each_article_once() {
    let fx = fixture(NEWS_CATEGORY).await;

    // Page 2 re-lists a2, as overlapping "latest" feeds do.
    mount_page(
        &fx.server,
        "/news",
        archive_page(&["/articles/a1", "/articles/a2"]),
    )
    .await;
    mount_page(
        &fx.server,
        "/news/page/2",
        archive_page(&["/articles/a2", "/articles/a3"]),
    )
    .await;
    mount_page(&fx.server, "/news/page/3", archive_page(&[])).await;
    for name in ["a1", "a2", "a3"] {
        mount_page(
            &fx.server,
            &format!("/articles/{}", name),
            article_page(name),
        )
        .await;
    }

    let config = load_config(&fx.config_path).unwrap();
    let summary = run_crawl(&config, RunOptions::default()).await.unwrap();

    assert_eq!(summary.totals().articles_saved, 3);
    assert_eq!(detail_fetch_count(&fx.server).await, 3);

    let records = read_artifact(&fx.output_path);
    let urls: Vec<&str> = records
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls.len(), 3);
    // First-seen order across pages.
    assert!(urls[0].ends_with("/articles/a1"));
    assert!(urls[1].ends_with("/articles/a2"));
    assert!(urls[2].ends_with("/articles/a3"));
}

#[tokio::test]
async fn url_manifest_is_written_alongside_the_artifact() {
    let fx = fixture(NEWS_CATEGORY).await;

    mount_page(&fx.server, "/news", archive_page(&["/articles/a1"])).await;
    mount_page(&fx.server, "/news/page/2", archive_page(&[])).await;
    mount_page(&fx.server, "/articles/a1", article_page("a1")).await;

    let config = load_config(&fx.config_path).unwrap();
    run_crawl(&config, RunOptions::default()).await.unwrap();

    let manifest_path = fx
        .output_path
        .parent()
        .unwrap()
        .join("mocknews_news_urls.json");
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["total_urls"], 1);
    assert!(manifest["urls"][0]
        .as_str()
        .unwrap()
        .ends_with("/articles/a1"));
}
