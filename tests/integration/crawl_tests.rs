//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! batch stream end-to-end. The mock servers listen on 127.0.0.1, so every
//! test except the guard test disables the SSRF guard.

use futures::StreamExt;
use std::collections::HashSet;
use std::io::Write;
use sumi_sieve::config::{parse_config, Config};
use sumi_sieve::crawler::{build_connector, BatchStream, CrawlOptions};
use sumi_sieve::{Document, DocumentSource, SieveError, SyncMarker};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for the given seed and mode
fn create_test_config(seed: &str, mode: &str, batch_size: usize, enforce_guard: bool) -> Config {
    parse_config(&format!(
        r#"
[crawl]
seed-url = "{}"
mode = "{}"
batch-size = {}
enforce-ssrf-guard = {}

[fetch]
request-timeout-secs = 5
"#,
        seed, mode, batch_size, enforce_guard
    ))
    .expect("test config should be valid")
}

/// Drains a stream, returning the batches and the error that ended it, if any
async fn collect(mut stream: BatchStream) -> (Vec<Vec<Document>>, Option<SieveError>) {
    let mut batches = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(batch) => batches.push(batch),
            Err(e) => return (batches, Some(e)),
        }
    }
    (batches, None)
}

async fn crawl(config: &Config, options: CrawlOptions) -> (Vec<Vec<Document>>, Option<SieveError>) {
    let connector = build_connector(config, options).expect("connector should build");
    collect(connector.produce()).await
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn ids(batches: &[Vec<Document>]) -> Vec<String> {
    batches.iter().flatten().map(|d| d.id.clone()).collect()
}

#[tokio::test]
async fn test_recursive_crawl_visits_each_page_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    for (route, title, body) in [
        ("/", "Home", r#"<a href="/a">A</a><a href="/b">B</a>"#),
        ("/a", "Page A", r#"<a href="/">Home</a><a href="/b#top">B</a>"#),
        ("/b", "Page B", r#"<a href="/a">A</a><a href="https://other.example/">Off-site</a>"#),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(title, body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = create_test_config(&base, "recursive", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none(), "unexpected error: {:?}", error);
    let ids = ids(&batches);
    assert_eq!(ids.len(), 3);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 3);
    assert!(ids.contains(&format!("{}/a", base)));

    let titles: HashSet<String> = batches
        .iter()
        .flatten()
        .map(|d| d.semantic_identifier.clone())
        .collect();
    assert!(titles.contains("Page A"));
    assert!(batches.iter().flatten().all(|d| d.source == DocumentSource::Web));
}

#[tokio::test]
async fn test_single_page_mode_does_not_follow_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", r#"<a href="/a">A</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page("A", ""))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "single", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    assert_eq!(ids(&batches), vec![format!("{}/", server.uri())]);
}

#[tokio::test]
async fn test_url_list_batches_are_bounded() {
    let server = MockServer::start().await;
    let mut list = tempfile::NamedTempFile::new().unwrap();
    for n in 0..5 {
        let route = format!("/doc{}", n);
        mount_page(&server, &route, html_page(&format!("Doc {}", n), "<p>text</p>")).await;
        writeln!(list, "{}{}", server.uri(), route).unwrap();
    }
    writeln!(list).unwrap();

    let config = create_test_config(list.path().to_str().unwrap(), "url-list", 2, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[tokio::test]
async fn test_sitemap_relative_and_absolute_entries() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>/one</loc></url>
                <url><loc>{}/two</loc></url>
            </urlset>"#,
            base
        )),
    )
    .await;
    mount_page(&server, "/one", html_page("One", "<p>first</p>")).await;
    mount_page(&server, "/two", html_page("Two", "<p>second</p>")).await;

    let config = create_test_config(&format!("{}/sitemap.xml", base), "sitemap", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    let found: HashSet<String> = ids(&batches).into_iter().collect();
    let expected: HashSet<String> = [format!("{}/one", base), format!("{}/two", base)]
        .into_iter()
        .collect();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn test_error_pages_skipped_but_links_followed() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        ResponseTemplate::new(404)
            .set_body_string(r#"<html><body><a href="/found">Found</a></body></html>"#),
    )
    .await;
    mount_page(&server, "/found", html_page("Found", "<p>here</p>")).await;

    let config = create_test_config(&server.uri(), "recursive", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    assert_eq!(ids(&batches), vec![format!("{}/found", server.uri())]);
}

#[tokio::test]
async fn test_redirect_to_visited_page_is_discarded() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Links are visited last-in first-out, so /target is fetched before /old
    mount_page(
        &server,
        "/",
        html_page("Home", r#"<a href="/old">Old</a><a href="/target">Target</a>"#),
    )
    .await;
    mount_page(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", format!("{}/target", base).as_str()),
    )
    .await;
    mount_page(&server, "/target", html_page("Target", "<p>moved here</p>")).await;

    let config = create_test_config(&base, "recursive", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    let ids = ids(&batches);
    assert_eq!(ids.len(), 2);
    assert_eq!(
        ids.iter().filter(|id| **id == format!("{}/target", base)).count(),
        1
    );
}

#[tokio::test]
async fn test_unreadable_pdf_is_skipped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200)
            .set_body_bytes(b"not really a pdf".to_vec())
            .insert_header("content-type", "application/pdf"),
    )
    .await;
    mount_page(&server, "/page", html_page("Page", "<p>ok</p>")).await;

    let mut list = tempfile::NamedTempFile::new().unwrap();
    writeln!(list, "{}/report.pdf", server.uri()).unwrap();
    writeln!(list, "{}/page", server.uri()).unwrap();

    let config = create_test_config(list.path().to_str().unwrap(), "url-list", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(error.is_none());
    assert_eq!(ids(&batches), vec![format!("{}/page", server.uri())]);
}

#[tokio::test]
async fn test_all_pages_failing_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "single", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(batches.is_empty());
    match error {
        Some(SieveError::TerminalCrawlFailure(message)) => {
            assert_eq!(
                message,
                format!("Skipped indexing {}/ due to HTTP 500 response", server.uri())
            );
        }
        other => panic!("expected terminal failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_url_list_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("urls.txt");

    let config = create_test_config(missing.to_str().unwrap(), "url-list", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(batches.is_empty());
    assert!(matches!(error, Some(SieveError::Io(_))));
}

#[tokio::test]
async fn test_guard_blocks_loopback_targets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_page("Internal", "<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "recursive", 10, true);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(batches.is_empty());
    let message = error.expect("crawl should fail").to_string();
    assert!(message.contains("127.0.0.1"), "message: {}", message);
    assert!(message.contains("Non-global IP address"), "message: {}", message);
}

#[tokio::test]
async fn test_cancelled_crawl_ends_quietly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_page("Home", ""))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let config = create_test_config(&server.uri(), "recursive", 10, false);
    let (batches, error) = crawl(
        &config,
        CrawlOptions {
            cancel: Some(cancel),
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(batches.is_empty());
    assert!(error.is_none());
}

fn thread_page(title: &str, pages: u32, posts: &[(&str, &str, &str)]) -> ResponseTemplate {
    let nav: String = (1..=pages)
        .map(|n| format!(r#"<li class="pageNav-page"><a>{}</a></li>"#, n))
        .collect();
    let articles: String = posts
        .iter()
        .map(|(id, date, text)| {
            format!(
                r#"<article class="message" data-content="{}">
                    <time datetime="{}">{}</time>
                    <div class="message-main"><p>{}</p></div>
                </article>"#,
                id, date, date, text
            )
        })
        .collect();
    html_page(
        title,
        &format!(
            r#"<h1 class="p-title-value">{}</h1><ul>{}</ul>{}"#,
            title, nav, articles
        ),
    )
}

fn board_page(pages: u32, threads: &[&str]) -> ResponseTemplate {
    let nav: String = (1..=pages)
        .map(|n| format!(r#"<li class="pageNav-page"><a>{}</a></li>"#, n))
        .collect();
    let items: String = threads
        .iter()
        .map(|t| format!(r#"<div class="structItem-title"><a href="{}">t</a></div>"#, t))
        .collect();
    html_page("Board", &format!("<ul>{}</ul>{}", nav, items))
}

#[tokio::test]
async fn test_forum_board_walks_listings_and_thread_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/forums/general.1/", board_page(2, &["/threads/alpha.10/"])).await;
    mount_page(
        &server,
        "/forums/general.1/page-2",
        board_page(2, &["/threads/beta.20/unread", "/threads/alpha.10/"]),
    )
    .await;
    mount_page(
        &server,
        "/threads/alpha.10/",
        thread_page("Alpha", 2, &[("post-1", "2024-03-01T10:00:00+0000", "alpha one")]),
    )
    .await;
    mount_page(
        &server,
        "/threads/alpha.10/page-2",
        thread_page("Alpha", 2, &[("post-2", "2024-03-02T10:00:00+0000", "alpha two")]),
    )
    .await;
    mount_page(
        &server,
        "/threads/beta.20/",
        thread_page("Beta", 1, &[("post-3", "2024-03-03T10:00:00+0000", "beta one")]),
    )
    .await;

    let config = create_test_config(&format!("{}/forums/general.1/", base), "forum-board", 2, false);
    let (batches, error) = crawl(
        &config,
        CrawlOptions {
            sync_marker: SyncMarker::first_run(),
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(error.is_none(), "unexpected error: {:?}", error);
    assert_eq!(
        ids(&batches),
        vec![
            format!("{}/threads/alpha.10/page-1#post-1", base),
            format!("{}/threads/alpha.10/page-2#post-2", base),
            format!("{}/threads/beta.20/page-1#post-3", base),
        ]
    );
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1]);

    let first = &batches[0][0];
    assert_eq!(first.source, DocumentSource::Xenforo);
    assert_eq!(first.semantic_identifier, "Alpha");
    assert_eq!(first.sections[0].text, "alpha one");
    assert_eq!(first.metadata.get("type").map(String::as_str), Some("post"));
}

#[tokio::test]
async fn test_forum_thread_incremental_filter() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/threads/topic.5/",
        thread_page(
            "Topic",
            1,
            &[
                ("post-1", "2024-03-01T10:00:00+0000", "old"),
                ("post-2", "2024-03-05T10:00:00+0000", "new"),
            ],
        ),
    )
    .await;

    // Page suffixes and anchors in the seed are dropped
    let seed = format!("{}/threads/topic.5/page-3#post-2", server.uri());
    let config = create_test_config(&seed, "forum-thread", 10, false);
    let marker = SyncMarker::since("2024-03-03T00:00:00Z".parse().unwrap());
    let (batches, error) = crawl(
        &config,
        CrawlOptions {
            sync_marker: marker,
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(error.is_none());
    let texts: Vec<String> = batches
        .iter()
        .flatten()
        .map(|d| d.sections[0].text.clone())
        .collect();
    assert_eq!(texts, vec!["new"]);
}

#[tokio::test]
async fn test_forum_nothing_new_is_not_a_failure() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/threads/quiet.7/",
        thread_page("Quiet", 1, &[("post-1", "2024-01-01T00:00:00+0000", "ancient")]),
    )
    .await;

    let config = create_test_config(&format!("{}/threads/quiet.7/", server.uri()), "forum-thread", 10, false);
    let marker = SyncMarker::since("2024-06-01T00:00:00Z".parse().unwrap());
    let (batches, error) = crawl(
        &config,
        CrawlOptions {
            sync_marker: marker,
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(batches.is_empty());
    assert!(error.is_none(), "unexpected error: {:?}", error);
}

#[tokio::test]
async fn test_forum_unreachable_thread_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let seed = format!("{}/threads/locked.9/", server.uri());
    let config = create_test_config(&seed, "forum-thread", 10, false);
    let (batches, error) = crawl(&config, CrawlOptions::default()).await;

    assert!(batches.is_empty());
    match error {
        Some(SieveError::TerminalCrawlFailure(message)) => {
            assert_eq!(message, format!("Skipped indexing {} due to HTTP 403 response", seed));
        }
        other => panic!("expected terminal failure, got {:?}", other),
    }
}
