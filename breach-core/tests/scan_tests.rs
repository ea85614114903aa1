// Tests for scan orchestration, the CSV report and the finding recorder

use breach_core::data::Database;
use breach_core::inject::FindingSink;
use breach_core::report::{CsvReport, REPORT_HEADER, generate_summary};
use breach_core::scan::{ScanHooks, ScanOptions, ScanRecorder, run_scan};
use breach_core::{CoreError, Finding, ProbeConfig, VulnerabilityKind};
use breach_scanner::error::Result as ScanResult;
use breach_scanner::{
    CrawlResult, EngineConfig, FetchEngine, HttpEngine, ProbeRequest, ProbeResponse,
    RenderedPage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

/// Wraps the HTTP engine and counts releases.
struct CountingEngine {
    inner: HttpEngine,
    releases: AtomicUsize,
}

impl CountingEngine {
    fn new() -> Self {
        Self {
            inner: HttpEngine::new(&EngineConfig::default().with_timeout(5)).unwrap(),
            releases: AtomicUsize::new(0),
        }
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl FetchEngine for CountingEngine {
    async fn fetch(&self, url: &str) -> ScanResult<RenderedPage> {
        self.inner.fetch(url).await
    }

    async fn submit(&self, request: &ProbeRequest) -> ScanResult<ProbeResponse> {
        self.inner.submit(request).await
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release().await;
    }
}

struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body).to_string();
        ResponseTemplate::new(200).set_body_string(format!("Welcome back {}", body))
    }
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// CSV report
// ============================================================================

#[test]
fn test_header_written_once_across_openings() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("scan_report.csv");

    {
        let mut report = CsvReport::open(&report_path).unwrap();
        report
            .append(&Finding::new(VulnerabilityKind::SqlInjection, "http://t/search", "q"))
            .unwrap();
    }
    {
        let mut report = CsvReport::open(&report_path).unwrap();
        report
            .append(&Finding::new(VulnerabilityKind::AuthBypass, "http://t/login", "JSON Body"))
            .unwrap();
    }

    let lines = read_lines(&report_path);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], REPORT_HEADER.join(","));
    assert_eq!(
        lines[1],
        "SQL Injection,http://t/search,q,A03:2021 - Injection,High"
    );
    assert!(lines[2].starts_with("Auth Bypass,http://t/login,JSON Body,"));
    assert!(lines[2].ends_with(",Critical"));
}

#[test]
fn test_report_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("reports").join("nested").join("out.csv");

    let report = CsvReport::open(&report_path).unwrap();
    assert_eq!(report.path(), report_path.as_path());
    assert_eq!(read_lines(&report_path).len(), 1);
}

#[test]
fn test_unwritable_report_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    // a directory cannot be opened as a file
    let result = CsvReport::open(temp_dir.path());
    assert!(matches!(result, Err(CoreError::Io(_))));
}

// ============================================================================
// Recorder
// ============================================================================

#[test]
fn test_recorder_emits_everywhere_at_once() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("report.csv");
    let db = Database::new(&temp_dir.path().join("history.db")).unwrap();

    let notified = Arc::new(Mutex::new(Vec::new()));
    let notified_cb = notified.clone();

    let mut recorder = ScanRecorder::new("http://t/", CsvReport::open(&report_path).unwrap())
        .with_history(db, "http://t/")
        .unwrap()
        .with_finding_callback(Some(Arc::new(move |f: &Finding| {
            notified_cb.lock().unwrap().push(f.parameter().to_string());
        })));

    recorder.emit(Finding::new(VulnerabilityKind::SqlInjection, "http://t/a", "q"));
    recorder.emit(Finding::new(VulnerabilityKind::NoSqlBypass, "http://t/api/login", "pass"));

    assert_eq!(read_lines(&report_path).len(), 3);
    assert_eq!(*notified.lock().unwrap(), vec!["q", "pass"]);

    let session_id = recorder.session_id().unwrap().to_string();
    let outcome = recorder.finish(CrawlResult::default());
    assert_eq!(outcome.summary.vuln_count, 2);
    assert_eq!(outcome.summary.high_count, 1);
    assert_eq!(outcome.summary.critical_count, 1);
    assert_eq!(outcome.findings.len(), 2);
    assert_eq!(outcome.session_id.as_deref(), Some(session_id.as_str()));

    let db = Database::new(&temp_dir.path().join("history.db")).unwrap();
    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, "completed");
    assert_eq!(session.vuln_count, 2);
    assert_eq!(db.get_findings_by_session(&session_id).unwrap().len(), 2);
}

// ============================================================================
// Orchestration
// ============================================================================

#[tokio::test]
async fn test_full_scan_over_http() {
    let mock_server = MockServer::start().await;

    let home = r#"<html><body><a href="/login">Login</a></body></html>"#;
    let login = r#"<html><body>
        <form action="/login" method="post">
            <input name="user"><input name="pass" type="password">
        </form>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(home),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(login),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(Echo)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut options = ScanOptions::new(mock_server.uri());
    options.max_depth = 1;
    options.report_path = temp_dir.path().join("scan_report.csv");
    options.db_path = Some(temp_dir.path().join("history.db"));
    options.probe = ProbeConfig {
        delay_threshold: Duration::from_millis(500),
        ..ProbeConfig::default()
    };

    let pages = Arc::new(AtomicUsize::new(0));
    let pages_cb = pages.clone();
    let hooks = ScanHooks {
        on_page: Some(Arc::new(move |_: usize, _: String| {
            pages_cb.fetch_add(1, Ordering::SeqCst);
        })),
        ..ScanHooks::default()
    };

    let engine = CountingEngine::new();
    let outcome = run_scan(&engine, &options, &hooks).await.unwrap();

    assert_eq!(engine.releases(), 1);
    assert_eq!(pages.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.surface.visited.len(), 2);
    assert_eq!(outcome.summary.form_count, 1);
    assert_eq!(outcome.summary.api_count, 0);
    assert_eq!(outcome.summary.vuln_count, 2);
    assert_eq!(outcome.summary.high_count, 2);
    assert!(outcome.session_id.is_some());

    let lines = read_lines(&options.report_path);
    assert_eq!(lines.len(), 3);

    let summary_text = generate_summary(&outcome.summary);
    assert!(summary_text.contains("Forms Discovered:    1"));
    assert!(summary_text.contains("A03:2021 - Injection"));
    assert!(summary_text.contains("COMPLETED"));
}

#[tokio::test]
async fn test_engine_released_when_scan_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = ScanOptions::new("not a url");
    options.report_path = temp_dir.path().join("scan_report.csv");
    options.db_path = Some(temp_dir.path().join("history.db"));

    let engine = CountingEngine::new();
    let result = run_scan(&engine, &options, &ScanHooks::default()).await;

    assert!(matches!(result, Err(CoreError::Scan(_))));
    assert_eq!(engine.releases(), 1);

    let db = Database::new(&temp_dir.path().join("history.db")).unwrap();
    let sessions = db.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, "failed");
}

#[tokio::test]
async fn test_engine_released_when_report_cannot_open() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = ScanOptions::new("http://127.0.0.1:1/");
    options.report_path = temp_dir.path().to_path_buf();

    let engine = CountingEngine::new();
    let result = run_scan(&engine, &options, &ScanHooks::default()).await;

    assert!(result.is_err());
    assert_eq!(engine.releases(), 1);
}

#[tokio::test]
async fn test_unreachable_target_completes_empty() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = ScanOptions::new("http://127.0.0.1:1/");
    options.report_path = temp_dir.path().join("scan_report.csv");

    let engine = CountingEngine::new();
    let outcome = run_scan(&engine, &options, &ScanHooks::default())
        .await
        .unwrap();

    assert_eq!(outcome.summary.vuln_count, 0);
    assert!(outcome.surface.is_empty());
    assert_eq!(read_lines(&options.report_path).len(), 1);
}
