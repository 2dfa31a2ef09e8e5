//! Integration tests for the crawler
//!
//! These tests use wiremock to serve listing pages and media, and check the
//! full crawl cycle end-to-end against a temporary SQLite database.

use chrono::{DateTime, TimeZone, Utc};
use qa_archiver::config::{Config, CrawlerConfig, OutputConfig};
use qa_archiver::crawler::{run_crawl, CrawlOptions};
use qa_archiver::storage::{SqliteStorage, Storage};
use qa_archiver::{ArchiveError, StopReason};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests for the newest listing page (no cursor)
struct NoCursor;

impl Match for NoCursor {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "older")
    }
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            base_url: format!("{}/", server.uri()),
            user_agent: "TestArchiver/1.0".to_string(),
            page_timeout_secs: 5,
            media_timeout_secs: 5,
            max_concurrent_articles: 4,
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            output_dir: "output".to_string(),
        },
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, d, 0, 0, 0).unwrap()
}

fn article(id: &str, timestamp: DateTime<Utc>, image: Option<&str>) -> String {
    let visual = image
        .map(|src| {
            format!(
                r#"<div class="streamItem_visual"><a data-action="ImageOpen"><img src="{}"></a></div>"#,
                src
            )
        })
        .unwrap_or_default();

    format!(
        r#"<article class="streamItem streamItem-answer">
             <header class="streamItem_header"><h2>question {id}</h2></header>
             <div class="streamItem_content">answer {id}</div>
             {visual}
             <div class="heartButton"><a class="counter">3</a></div>
             <a class="streamItem_meta" href="/alice/answers/{id}" title="x"><time datetime="{ts}">ago</time></a>
           </article>"#,
        id = id,
        visual = visual,
        ts = timestamp.format("%Y-%m-%dT%H:%M:%S"),
    )
}

fn listing(articles: &[String], next_cursor: Option<&str>) -> String {
    let next = next_cursor
        .map(|c| format!(r#"<a class="item-page-next" href="/alice?older={}">Next</a>"#, c))
        .unwrap_or_default();

    format!(
        r#"<html><body>
             <div class="userName_status"><span>Alice</span></div>
             <div class="profileStats_number profileTabAnswerCount" title="6 answers">6</div>
             <div class="item-page">{}</div>
             {}
           </body></html>"#,
        articles.concat(),
        next
    )
}

async fn mount_page(server: &MockServer, cursor: Option<&str>, body: String) {
    let mock = Mock::given(method("GET")).and(path("/alice"));
    let mock = match cursor {
        Some(c) => mock.and(query_param("older", c)),
        None => mock.and(NoCursor),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts alice's three pages of two records each, newest first
async fn mount_alice(server: &MockServer) {
    mount_page(
        server,
        None,
        listing(&[article("6", day(6), None), article("5", day(5), None)], Some("c2")),
    )
    .await;
    mount_page(
        server,
        Some("c2"),
        listing(&[article("4", day(4), None), article("3", day(3), None)], Some("c3")),
    )
    .await;
    mount_page(
        server,
        Some("c3"),
        listing(&[article("2", day(2), None), article("1", day(1), None)], None),
    )
    .await;
}

fn record_ids(db_path: &Path) -> Vec<String> {
    let storage = SqliteStorage::new(db_path).unwrap();
    storage
        .load_records_after("alice", None)
        .unwrap()
        .into_iter()
        .map(|r| r.record_id)
        .collect()
}

#[tokio::test]
async fn test_stop_before_boundary_excludes_equal_timestamp() {
    let server = MockServer::start().await;
    mount_alice(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let config = create_test_config(&server, &db_path);

    // The fifth record processed sits exactly on the boundary
    let options = CrawlOptions::new("alice", dir.path().join("output")).with_stop_before(Some(day(2)));
    let result = run_crawl(&config, options).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.records_written, 4);
    assert_eq!(result.stop_reason, StopReason::Boundary);
    assert_eq!(result.last_cursor.as_deref(), Some("c3"));
    assert_eq!(record_ids(&db_path), vec!["3", "4", "5", "6"]);
}

#[tokio::test]
async fn test_full_history_reaches_end() {
    let server = MockServer::start().await;
    mount_alice(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let config = create_test_config(&server, &db_path);

    let result = run_crawl(&config, CrawlOptions::new("Alice", dir.path().join("output")))
        .await
        .unwrap();

    assert_eq!(result.records_written, 6);
    assert_eq!(result.stop_reason, StopReason::EndOfHistory);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let owner = storage.get_owner("alice").unwrap().unwrap();
    assert_eq!(owner.display_name.as_deref(), Some("Alice"));
    assert_eq!(owner.first_record_at, Some(day(1)));
    assert_eq!(owner.last_record_at, Some(day(6)));
}

#[tokio::test]
async fn test_next_page_failure_commits_assembled_records() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        listing(&[article("6", day(6), None), article("5", day(5), None)], Some("c2")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/alice"))
        .and(query_param("older", "c2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let config = create_test_config(&server, &db_path);

    let result = run_crawl(&config, CrawlOptions::new("alice", dir.path().join("output")))
        .await
        .unwrap();

    assert_eq!(result.stop_reason, StopReason::Failed);
    assert!(matches!(result.error, Some(ArchiveError::Fetch(_))));
    assert_eq!(result.records_written, 2);
    assert_eq!(result.last_cursor.as_deref(), Some("c2"));
    assert_eq!(record_ids(&db_path), vec!["5", "6"]);
}

#[tokio::test]
async fn test_resume_never_repersists_committed_records() {
    let server = MockServer::start().await;
    // The first request for page 2 fails, later ones succeed
    Mock::given(method("GET"))
        .and(path("/alice"))
        .and(query_param("older", "c2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_alice(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let config = create_test_config(&server, &db_path);
    let output = dir.path().join("output");

    let interrupted = run_crawl(&config, CrawlOptions::new("alice", &output))
        .await
        .unwrap();
    assert_eq!(interrupted.records_written, 2);
    let cursor = interrupted.last_cursor.clone();
    assert_eq!(cursor.as_deref(), Some("c2"));

    let resumed = run_crawl(
        &config,
        CrawlOptions::new("alice", &output).with_resume_cursor(cursor),
    )
    .await
    .unwrap();
    assert!(resumed.is_success());
    assert_eq!(resumed.records_written, 4);
    assert_eq!(resumed.stop_reason, StopReason::EndOfHistory);

    // Starting over from the newest page stops at the first known record
    let again = run_crawl(&config, CrawlOptions::new("alice", &output))
        .await
        .unwrap();
    assert_eq!(again.records_written, 0);
    assert_eq!(again.stop_reason, StopReason::KnownRecord);

    assert_eq!(record_ids(&db_path), vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn test_identical_media_stored_once() {
    let server = MockServer::start().await;
    for p in ["/img/a.jpg", "/img/b.jpg"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"same pixels".to_vec()))
            .mount(&server)
            .await;
    }
    mount_page(
        &server,
        None,
        listing(
            &[
                article("11", day(11), Some("/img/a.jpg")),
                article("10", day(10), Some("/img/b.jpg")),
            ],
            None,
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let config = create_test_config(&server, &db_path);
    let output = dir.path().join("output");

    let result = run_crawl(&config, CrawlOptions::new("alice", &output))
        .await
        .unwrap();
    assert_eq!(result.records_written, 2);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let records = storage.load_records_after("alice", None).unwrap();
    let first = records[0].visual.clone().unwrap();
    let second = records[1].visual.clone().unwrap();
    assert_eq!(first.visual_id, second.visual_id);
    assert_eq!(first.extension, second.extension);
    assert_eq!(first.content_hash, second.content_hash);
    assert_ne!(first.source_url, second.source_url);

    let files: Vec<_> = std::fs::read_dir(output.join("visuals_alice"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files, vec![format!("{}.jpg", first.visual_id)]);
}

#[tokio::test]
async fn test_visual_resolution_is_stable_across_runs() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data.db");
    let output = dir.path().join("output");

    let first_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/original.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"photo".to_vec()))
        .mount(&first_server)
        .await;
    mount_page(
        &first_server,
        None,
        listing(&[article("1", day(1), Some("/img/original.jpg"))], None),
    )
    .await;

    let config = create_test_config(&first_server, &db_path);
    let first = run_crawl(&config, CrawlOptions::new("alice", &output))
        .await
        .unwrap();
    assert_eq!(first.records_written, 1);

    let second_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/reupload.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"photo".to_vec()))
        .mount(&second_server)
        .await;
    mount_page(
        &second_server,
        None,
        listing(
            &[
                article("2", day(2), Some("/img/reupload.png")),
                article("1", day(1), Some("/img/original.jpg")),
            ],
            None,
        ),
    )
    .await;

    let config = create_test_config(&second_server, &db_path);
    let second = run_crawl(&config, CrawlOptions::new("alice", &output))
        .await
        .unwrap();
    assert_eq!(second.records_written, 1);
    assert_eq!(second.stop_reason, StopReason::KnownRecord);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let records = storage.load_records_after("alice", None).unwrap();
    let original = records[0].visual.clone().unwrap();
    let reupload = records[1].visual.clone().unwrap();
    assert_eq!(original.visual_id, "1");
    assert_eq!(reupload.visual_id, "1");
    assert_eq!(reupload.extension, "jpg");

    assert!(output.join("visuals_alice").join("1.jpg").exists());
    assert!(!output.join("visuals_alice").join("2.png").exists());
}
