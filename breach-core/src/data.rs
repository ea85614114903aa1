use crate::finding::Finding;
use crate::state::ScanSummary;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DB_NAME: &str = "breach.db";

/// Scan history: one row per scan session plus the findings it produced.
pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub target: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: String,
    pub form_count: i64,
    pub api_count: i64,
    pub vuln_count: i64,
    pub critical_count: i64,
    pub high_count: i64,
    pub medium_count: i64,
}

impl SessionRecord {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            target: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            status: row.get(4)?,
            form_count: row.get(5)?,
            api_count: row.get(6)?,
            vuln_count: row.get(7)?,
            critical_count: row.get(8)?,
            high_count: row.get(9)?,
            medium_count: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: i64,
    pub vulnerability: String,
    pub url: String,
    pub parameter: String,
    pub owasp_category: String,
    pub severity: String,
    pub discovered_at: i64,
}

const SESSION_COLUMNS: &str = "id, target, start_time, end_time, status, form_count, api_count, \
     vuln_count, critical_count, high_count, medium_count";

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scan_sessions (
                id TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
                form_count INTEGER NOT NULL DEFAULT 0,
                api_count INTEGER NOT NULL DEFAULT 0,
                vuln_count INTEGER NOT NULL DEFAULT 0,
                critical_count INTEGER NOT NULL DEFAULT 0,
                high_count INTEGER NOT NULL DEFAULT 0,
                medium_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS findings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                vulnerability TEXT NOT NULL,
                url TEXT NOT NULL,
                parameter TEXT NOT NULL,
                owasp_category TEXT NOT NULL,
                severity TEXT NOT NULL CHECK(severity IN ('Critical', 'High', 'Medium')),
                discovered_at INTEGER NOT NULL,
                FOREIGN KEY(session_id) REFERENCES scan_sessions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_findings_session ON findings(session_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_start ON scan_sessions(start_time);
            ",
        )
    }

    pub fn create_session(&self, target: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO scan_sessions (id, target, start_time, status) VALUES (?1, ?2, ?3, ?4)",
            params![&session_id, target, current_timestamp(), "running"],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str, summary: &ScanSummary) -> Result<()> {
        self.conn.execute(
            "UPDATE scan_sessions SET status = ?1, end_time = ?2, form_count = ?3, api_count = ?4,
                vuln_count = ?5, critical_count = ?6, high_count = ?7, medium_count = ?8
             WHERE id = ?9",
            params![
                "completed",
                current_timestamp(),
                summary.form_count as i64,
                summary.api_count as i64,
                summary.vuln_count as i64,
                summary.critical_count as i64,
                summary.high_count as i64,
                summary.medium_count as i64,
                session_id,
            ],
        )?;
        Ok(())
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE scan_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params!["failed", current_timestamp(), session_id],
        )?;
        Ok(())
    }

    pub fn insert_finding(&self, session_id: &str, finding: &Finding) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO findings (
                session_id, vulnerability, url, parameter, owasp_category, severity, discovered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_id,
                finding.kind().label(),
                finding.endpoint(),
                finding.parameter(),
                finding.owasp_category(),
                finding.severity().as_str(),
                current_timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM scan_sessions WHERE id = ?1", SESSION_COLUMNS),
                params![session_id],
                SessionRecord::from_row,
            )
            .optional()
    }

    /// Most recent first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scan_sessions ORDER BY start_time DESC, rowid DESC",
            SESSION_COLUMNS
        ))?;

        let sessions = stmt
            .query_map([], SessionRecord::from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }

    pub fn get_findings_by_session(&self, session_id: &str) -> Result<Vec<FindingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, vulnerability, url, parameter, owasp_category, severity, discovered_at
             FROM findings WHERE session_id = ?1 ORDER BY CASE severity
                WHEN 'Critical' THEN 1
                WHEN 'High' THEN 2
                WHEN 'Medium' THEN 3
            END, id",
        )?;

        let findings = stmt
            .query_map(params![session_id], |row| {
                Ok(FindingRecord {
                    id: row.get(0)?,
                    vulnerability: row.get(1)?,
                    url: row.get(2)?,
                    parameter: row.get(3)?,
                    owasp_category: row.get(4)?,
                    severity: row.get(5)?,
                    discovered_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(findings)
    }

    pub fn get_findings_count_by_severity(&self, session_id: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT severity, COUNT(*) FROM findings WHERE session_id = ?1 GROUP BY severity ORDER BY severity",
        )?;

        let counts = stmt
            .query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(counts)
    }
}
