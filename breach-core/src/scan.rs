//! Scan orchestration: crawl, probe, record.

use crate::data::Database;
use crate::error::Result;
use crate::finding::Finding;
use crate::inject::{FindingSink, Injector, ProbeConfig};
use crate::report::{CsvReport, DEFAULT_REPORT_PATH};
use crate::state::{ScanAggregate, ScanSummary};
use breach_scanner::crawler::DEFAULT_MAX_DEPTH;
use breach_scanner::{CrawlResult, Crawler, FetchEngine, ProgressCallback};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub type FindingCallback = Arc<dyn Fn(&Finding) + Send + Sync>;
pub type PhaseCallback = Arc<dyn Fn(ScanPhase) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Crawling,
    Probing,
    Done,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub target: String,
    pub max_depth: usize,
    pub report_path: PathBuf,
    pub db_path: Option<PathBuf>,
    pub probe: ProbeConfig,
}

impl ScanOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            db_path: None,
            probe: ProbeConfig::default(),
        }
    }
}

/// Optional observers for console output.
#[derive(Clone, Default)]
pub struct ScanHooks {
    pub on_page: Option<ProgressCallback>,
    pub on_phase: Option<PhaseCallback>,
    pub on_finding: Option<FindingCallback>,
}

impl ScanHooks {
    fn phase(&self, phase: ScanPhase) {
        if let Some(ref callback) = self.on_phase {
            callback(phase);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub summary: ScanSummary,
    pub surface: CrawlResult,
    pub findings: Vec<Finding>,
    pub session_id: Option<String>,
    pub report_path: PathBuf,
}

/// The production [`FindingSink`]. One `emit` updates the aggregate, appends
/// the CSV row, stores the finding in the history database and notifies the
/// console.
pub struct ScanRecorder {
    aggregate: ScanAggregate,
    report: CsvReport,
    history: Option<(Database, String)>,
    on_finding: Option<FindingCallback>,
    findings: Vec<Finding>,
}

impl ScanRecorder {
    pub fn new(target: &str, report: CsvReport) -> Self {
        Self {
            aggregate: ScanAggregate::new(target),
            report,
            history: None,
            on_finding: None,
            findings: Vec::new(),
        }
    }

    pub fn with_history(mut self, db: Database, target: &str) -> Result<Self> {
        let session_id = db.create_session(target)?;
        info!("Recording scan history as session {}", session_id);
        self.history = Some((db, session_id));
        Ok(self)
    }

    pub fn with_finding_callback(mut self, callback: Option<FindingCallback>) -> Self {
        self.on_finding = callback;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.history.as_ref().map(|(_, id)| id.as_str())
    }

    pub fn set_surface(&mut self, surface: &CrawlResult) {
        self.aggregate
            .set_surface(surface.form_count(), surface.api_count());
    }

    pub fn finish(self, surface: CrawlResult) -> ScanOutcome {
        let summary = self.aggregate.summarize();
        let session_id = self.history.map(|(db, id)| {
            if let Err(e) = db.complete_session(&id, &summary) {
                warn!("Failed to close session {}: {}", id, e);
            }
            id
        });

        ScanOutcome {
            summary,
            surface,
            findings: self.findings,
            session_id,
            report_path: self.report.path().to_path_buf(),
        }
    }

    pub fn fail(self) {
        if let Some((db, id)) = self.history
            && let Err(e) = db.fail_session(&id)
        {
            warn!("Failed to mark session {} as failed: {}", id, e);
        }
    }
}

impl FindingSink for ScanRecorder {
    fn emit(&mut self, finding: Finding) {
        self.aggregate
            .record(finding.severity(), finding.owasp_category());

        if let Err(e) = self.report.append(&finding) {
            warn!("Failed to write finding to {}: {}", self.report.path().display(), e);
        }

        if let Some((ref db, ref session_id)) = self.history
            && let Err(e) = db.insert_finding(session_id, &finding)
        {
            warn!("Failed to store finding: {}", e);
        }

        if let Some(ref callback) = self.on_finding {
            callback(&finding);
        }

        self.findings.push(finding);
    }
}

/// Crawl the target and probe everything found. The engine is left open.
pub async fn execute_scan<E: FetchEngine>(
    engine: &E,
    options: &ScanOptions,
    hooks: &ScanHooks,
) -> Result<ScanOutcome> {
    let report = CsvReport::open(&options.report_path)?;
    let mut recorder =
        ScanRecorder::new(&options.target, report).with_finding_callback(hooks.on_finding.clone());
    if let Some(ref db_path) = options.db_path {
        recorder = recorder.with_history(Database::new(db_path)?, &options.target)?;
    }

    hooks.phase(ScanPhase::Crawling);
    let mut crawler = Crawler::new(engine).with_max_depth(options.max_depth);
    if let Some(ref callback) = hooks.on_page {
        crawler = crawler.with_progress_callback(callback.clone());
    }

    let surface = match crawler.scan(&options.target).await {
        Ok(surface) => surface,
        Err(e) => {
            recorder.fail();
            return Err(e.into());
        }
    };
    recorder.set_surface(&surface);
    if surface.is_empty() {
        warn!("Nothing to probe on {}", options.target);
    } else {
        info!(
            "Discovered {} forms and {} API calls",
            surface.form_count(),
            surface.api_count()
        );
    }

    hooks.phase(ScanPhase::Probing);
    Injector::new(engine, options.probe.clone())
        .probe_all(&surface, &mut recorder)
        .await;

    hooks.phase(ScanPhase::Done);
    let outcome = recorder.finish(surface);
    info!("Scan finished with {} findings", outcome.summary.vuln_count);
    Ok(outcome)
}

/// Run a scan and release the engine afterwards, whether or not the scan
/// succeeded.
pub async fn run_scan<E: FetchEngine>(
    engine: &E,
    options: &ScanOptions,
    hooks: &ScanHooks,
) -> Result<ScanOutcome> {
    let outcome = execute_scan(engine, options, hooks).await;
    engine.release().await;
    outcome
}
