// Tests for the scan history database

use breach_core::data::Database;
use breach_core::{Finding, ScanAggregate, Severity, VulnerabilityKind};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));
    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(Database::exists(&db_path));
}

#[test]
fn test_reopening_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let session_id = {
        let db = Database::new(&db_path).unwrap();
        db.create_session("http://example.com/").unwrap()
    };

    let db = Database::new(&db_path).unwrap();
    assert!(db.get_session(&session_id).unwrap().is_some());
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_create_session() {
    let (_temp_dir, db) = create_test_db();

    let session_id = db.create_session("http://example.com/").unwrap();
    let session = db.get_session(&session_id).unwrap().unwrap();

    assert_eq!(session.target, "http://example.com/");
    assert_eq!(session.status, "running");
    assert_eq!(session.end_time, None);
    assert_eq!(session.vuln_count, 0);
}

#[test]
fn test_create_multiple_sessions() {
    let (_temp_dir, db) = create_test_db();

    let session1 = db.create_session("http://example1.com/").unwrap();
    let session2 = db.create_session("http://example2.com/").unwrap();

    assert_ne!(session1, session2);
    assert_eq!(db.list_sessions().unwrap().len(), 2);
}

#[test]
fn test_complete_session_stores_counters() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session("http://example.com/").unwrap();

    let mut aggregate = ScanAggregate::new("http://example.com/");
    aggregate.set_surface(4, 2);
    aggregate.record(Severity::High, "A03:2021 - Injection");
    aggregate.record(Severity::Critical, "A07:2021 - Identification and Authentication Failures");

    db.complete_session(&session_id, &aggregate.summarize()).unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, "completed");
    assert!(session.end_time.is_some());
    assert_eq!(session.form_count, 4);
    assert_eq!(session.api_count, 2);
    assert_eq!(session.vuln_count, 2);
    assert_eq!(session.critical_count, 1);
    assert_eq!(session.high_count, 1);
    assert_eq!(session.medium_count, 0);
}

#[test]
fn test_fail_session() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session("http://example.com/").unwrap();

    db.fail_session(&session_id).unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, "failed");
    assert!(session.end_time.is_some());
}

#[test]
fn test_unknown_session() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_session("nope").unwrap().is_none());
    assert!(db.get_findings_by_session("nope").unwrap().is_empty());
}

// ============================================================================
// Finding Tests
// ============================================================================

#[test]
fn test_insert_finding() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session("http://example.com/").unwrap();

    let finding = Finding::new(VulnerabilityKind::SqlInjection, "http://example.com/search", "q");
    let id = db.insert_finding(&session_id, &finding).unwrap();
    assert!(id > 0);

    let findings = db.get_findings_by_session(&session_id).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].vulnerability, "SQL Injection");
    assert_eq!(findings[0].url, "http://example.com/search");
    assert_eq!(findings[0].parameter, "q");
    assert_eq!(findings[0].owasp_category, "A03:2021 - Injection");
    assert_eq!(findings[0].severity, "High");
}

#[test]
fn test_findings_ordered_by_severity() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session("http://example.com/").unwrap();

    let findings = [
        Finding::new(VulnerabilityKind::BlindSqlInjection, "http://example.com/api/a", "x"),
        Finding::new(VulnerabilityKind::SqlInjection, "http://example.com/b", "y"),
        Finding::new(VulnerabilityKind::AuthBypass, "http://example.com/login", "JSON Body"),
    ];
    for finding in &findings {
        db.insert_finding(&session_id, finding).unwrap();
    }

    let severities: Vec<String> = db
        .get_findings_by_session(&session_id)
        .unwrap()
        .into_iter()
        .map(|f| f.severity)
        .collect();
    assert_eq!(severities, vec!["Critical", "High", "Medium"]);

    let counts = db.get_findings_count_by_severity(&session_id).unwrap();
    assert_eq!(counts.len(), 3);
    assert!(counts.iter().all(|(_, count)| *count == 1));
}

#[test]
fn test_findings_are_scoped_to_session() {
    let (_temp_dir, db) = create_test_db();
    let first = db.create_session("http://a.example/").unwrap();
    let second = db.create_session("http://b.example/").unwrap();

    db.insert_finding(
        &first,
        &Finding::new(VulnerabilityKind::NoSqlError, "http://a.example/api", "q"),
    )
    .unwrap();

    assert_eq!(db.get_findings_by_session(&first).unwrap().len(), 1);
    assert!(db.get_findings_by_session(&second).unwrap().is_empty());
}

#[test]
fn test_finding_requires_existing_session() {
    let (_temp_dir, db) = create_test_db();
    let finding = Finding::new(VulnerabilityKind::SqlInjection, "http://example.com/", "q");

    assert!(db.insert_finding("missing-session", &finding).is_err());
}
