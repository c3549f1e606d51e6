//! Integration tests for scraping sessions
//!
//! These tests use wiremock to create mock HTTP servers and run full sessions
//! against a temporary save root.

use page_harvester::config::{Config, DelayConfig, OutputConfig, ScraperConfig, SessionConfig};
use page_harvester::crawler::{RecordingPacer, ScrapingManager, TokioPacer};
use page_harvester::storage::{open_storage, MetadataStore, SqliteStorage};
use page_harvester::{
    ErrorCategory, FetchStatus, HarvestError, MetadataExporter, SessionPhase, StopReason,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, save_path: &Path, max_retries: u32) -> Config {
    Config {
        scraper: ScraperConfig {
            base_url: base_url.to_string(),
            save_path: save_path.to_path_buf(),
            user_agent: "TestHarvester/1.0".to_string(),
            timeout_secs: 5,
            max_retries,
        },
        delay: DelayConfig {
            min_seconds: 0.0,
            max_seconds: 0.0,
            retry_min_seconds: None,
            retry_max_seconds: None,
        },
        session: SessionConfig::default(),
        output: OutputConfig::default(),
        headers: BTreeMap::new(),
    }
}

fn create_manager(
    config: Config,
) -> (ScrapingManager<SqliteStorage, RecordingPacer>, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::new());
    let store = open_storage(&config.scraper.save_path).expect("Failed to open store");
    let manager = ScrapingManager::with_parts(config, "test-hash", store, pacer.clone())
        .expect("Failed to build manager");
    (manager, pacer)
}

async fn mount_page(server: &MockServer, page: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Serves a page, but first swaps the session directory for a plain file
struct BlockDirectory {
    session_dir: PathBuf,
}

impl Respond for BlockDirectory {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        std::fs::remove_dir_all(&self.session_dir).unwrap();
        std::fs::write(&self.session_dir, b"no longer a directory").unwrap();
        ResponseTemplate::new(200).set_body_string("<html>two</html>")
    }
}

#[tokio::test]
async fn test_failed_page_does_not_abort_session() {
    let server = MockServer::start().await;
    mount_page(&server, "/p/1", 200, "<html>one</html>").await;
    mount_page(&server, "/p/3", 200, "<html>three</html>").await;
    Mock::given(method("GET"))
        .and(path("/p/2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let base_url = format!("{}/p", server.uri());
    let (mut manager, pacer) = create_manager(create_test_config(&base_url, root.path(), 2));

    let record = manager
        .start_scraping_session("quiz", 3, 1)
        .await
        .expect("Session should complete");

    assert_eq!(record.attempted(), 3);
    assert_eq!(record.succeeded(), 2);
    assert_eq!(record.failed(), 1);
    assert_eq!(record.succeeded() + record.failed(), record.attempted());
    assert_eq!(record.stop_reason, Some(StopReason::Completed));

    let page2 = &record.outcomes()[1];
    assert_eq!(page2.page_id, "2");
    assert_eq!(page2.status, FetchStatus::Failure);
    assert_eq!(page2.retries, 2);
    assert_eq!(page2.http_code, Some(500));
    assert_eq!(page2.error_category, Some(ErrorCategory::RetryableHttpError));
    assert!(page2.saved_path.is_none());

    let page3 = &record.outcomes()[2];
    assert_eq!(page3.status, FetchStatus::Success);
    assert_eq!(
        std::fs::read_to_string(root.path().join("quiz").join("page_3.html")).unwrap(),
        "<html>three</html>"
    );

    // Two zero-length retry pauses; page delays are skipped when zero
    assert_eq!(pacer.pauses(), vec![Duration::ZERO; 2]);
}

#[tokio::test]
async fn test_terminal_status_uses_no_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 3));

    let record = manager.start_scraping_session("gone", 1, 1).await.unwrap();

    let outcome = &record.outcomes()[0];
    assert_eq!(outcome.retries, 0);
    assert_eq!(outcome.status, FetchStatus::Failure);
    assert_eq!(outcome.error_category, Some(ErrorCategory::HttpError));
}

#[tokio::test]
async fn test_sessions_accumulate_across_managers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();

    let (mut first, _) = create_manager(create_test_config(&server.uri(), root.path(), 0));
    first.start_scraping_session("a", 2, 1).await.unwrap();
    drop(first);

    let (mut second, _) = create_manager(create_test_config(&server.uri(), root.path(), 0));
    second.start_scraping_session("b", 3, 1).await.unwrap();

    let stats = second.get_total_stats().unwrap();
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.attempted, 5);
    assert_eq!(stats.succeeded, 5);

    // A fresh handle on the same store sees both sessions
    let store = open_storage(root.path()).unwrap();
    let names: Vec<_> = store
        .load_sessions()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_rerun_replaces_same_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 0));

    manager.start_scraping_session("a", 3, 1).await.unwrap();
    manager.start_scraping_session("b", 1, 1).await.unwrap();
    manager.start_scraping_session("a", 2, 1).await.unwrap();

    let stats = manager.get_total_stats().unwrap();
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.attempted, 3);
}

#[tokio::test]
async fn test_export_is_byte_identical() {
    let server = MockServer::start().await;
    mount_page(&server, "/1", 200, "one").await;
    mount_page(&server, "/2", 503, "").await;

    let root = tempfile::tempdir().unwrap();
    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 1));
    manager.start_scraping_session("s", 2, 1).await.unwrap();

    let dest = root.path().join("summary.csv");
    let exporter = MetadataExporter::new(manager.store());
    exporter.export_csv(&dest).unwrap();
    let first = std::fs::read(&dest).unwrap();
    exporter.export_csv(&dest).unwrap();
    let second = std::fs::read(&dest).unwrap();

    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("s,1,success,200,"));
    assert!(lines[2].starts_with("s,2,failure,503,"));
    assert!(lines[2].ends_with(",1,,retryable_http_error"));
}

#[tokio::test]
async fn test_zero_delay_session_is_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .expect(5)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server.uri(), root.path(), 0);
    config.delay.min_seconds = 5.0;
    config.delay.max_seconds = 10.0;
    config.delay.disable();

    // The real pacer: any configured delay would show up as wall time
    let store = open_storage(root.path()).unwrap();
    let mut manager = ScrapingManager::with_parts(config, "h", store, Arc::new(TokioPacer)).unwrap();

    let started = Instant::now();
    let record = manager.start_scraping_session("quick", 5, 1).await.unwrap();

    assert_eq!(record.succeeded(), 5);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_unusable_directory_fails_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("blocked"), b"a file, not a directory").unwrap();
    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 0));

    let result = manager.start_scraping_session("blocked", 3, 1).await;

    assert!(matches!(result, Err(HarvestError::PageStore(ref e)) if e.is_fatal()));
    assert_eq!(manager.store().count_sessions().unwrap(), 0);
}

#[tokio::test]
async fn test_short_body_is_content_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("oops"))
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server.uri(), root.path(), 3);
    config.session.min_content_length = Some(64);
    config.session.retry_content_errors = false;
    let (mut manager, _) = create_manager(config);

    let record = manager.start_scraping_session("thin", 1, 1).await.unwrap();

    let outcome = &record.outcomes()[0];
    assert_eq!(outcome.error_category, Some(ErrorCategory::ContentError));
    assert_eq!(outcome.retries, 0);
    assert!(!root.path().join("thin").join("page_1.html").exists());
}

#[tokio::test]
async fn test_page_write_error_does_not_abort_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>page</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    // A directory where page 2 should land makes only that write fail
    std::fs::create_dir_all(root.path().join("s").join("page_2.html")).unwrap();
    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 2));

    let record = manager.start_scraping_session("s", 3, 1).await.unwrap();

    assert_eq!(record.attempted(), 3);
    assert_eq!(record.succeeded(), 2);
    assert_eq!(record.stop_reason, Some(StopReason::Completed));

    let page2 = &record.outcomes()[1];
    assert_eq!(page2.status, FetchStatus::Failure);
    assert_eq!(page2.error_category, Some(ErrorCategory::StorageError));
    assert_eq!(page2.http_code, Some(200));
    assert_eq!(page2.retries, 0);
    assert!(page2.saved_path.is_none());

    assert!(root.path().join("s").join("page_3.html").is_file());
}

#[tokio::test]
async fn test_directory_lost_mid_session_is_fatal() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    let session_dir = root.path().join("s");

    mount_page(&server, "/1", 200, "<html>one</html>").await;
    Mock::given(method("GET"))
        .and(path("/2"))
        .respond_with(BlockDirectory {
            session_dir: session_dir.clone(),
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (mut manager, _) = create_manager(create_test_config(&server.uri(), root.path(), 0));

    let result = manager.start_scraping_session("s", 3, 1).await;

    assert!(matches!(result, Err(HarvestError::PageStore(ref e)) if e.is_fatal()));
    assert_eq!(manager.phase(), SessionPhase::Finalized);

    let stored = manager.store().get_session("s").unwrap().unwrap();
    assert_eq!(stored.stop_reason, Some(StopReason::StorageFailure));
    assert_eq!(stored.attempted(), 2);
    assert_eq!(stored.succeeded(), 1);
    assert_eq!(stored.outcomes()[1].error_category, Some(ErrorCategory::StorageError));
    assert_eq!(stored.outcomes()[1].http_code, Some(200));
}
