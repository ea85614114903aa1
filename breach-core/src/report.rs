// Report output: the append-only CSV sink and the console summary

use crate::error::Result;
use crate::finding::Finding;
use crate::state::ScanSummary;
use csv::{Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_REPORT_PATH: &str = "scan_report.csv";

pub const REPORT_HEADER: [&str; 5] = [
    "Vulnerability",
    "URL",
    "Parameter",
    "OWASP Category",
    "Severity",
];

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// CSV report that survives across runs. The header goes in once, when the
/// file is first created; every finding after that is one appended row.
pub struct CsvReport {
    path: PathBuf,
    writer: Writer<File>,
}

impl CsvReport {
    pub fn open(path: &Path) -> Result<Self> {
        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            debug!("Creating report {}", path.display());
            writer.write_record(REPORT_HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, finding: &Finding) -> Result<()> {
        self.writer.write_record([
            finding.kind().label(),
            finding.endpoint(),
            finding.parameter(),
            finding.owasp_category(),
            finding.severity().as_str(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Plain-text end-of-scan summary.
pub fn generate_summary(summary: &ScanSummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                    BREACH SCAN SUMMARY\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Target:              {}\n", summary.target));
    report.push_str(&format!("Forms Discovered:    {}\n", summary.form_count));
    report.push_str(&format!("APIs Discovered:     {}\n", summary.api_count));
    report.push_str(&format!("Vulnerabilities:     {}\n", summary.vuln_count));
    if summary.critical_count > 0 {
        report.push_str(&format!("Critical Severity:   {}\n", summary.critical_count));
    }
    report.push_str(&format!("High Severity:       {}\n", summary.high_count));
    report.push_str(&format!("Medium Severity:     {}\n", summary.medium_count));

    let categories = if summary.owasp_categories.is_empty() {
        "None".to_string()
    } else {
        summary
            .owasp_categories
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    report.push_str(&format!("OWASP Categories:    {}\n", categories));
    report.push_str(&format!("Scan Time:           {}\n", summary.elapsed));
    report.push_str("Status:              COMPLETED\n\n");

    report.push_str(RULE);
    report.push('\n');
    report.push_str("For authorized security testing only.\n");

    report
}
