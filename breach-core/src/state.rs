use crate::finding::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Running totals for one scan.
#[derive(Debug, Clone)]
pub struct ScanAggregate {
    target: String,
    form_count: usize,
    api_count: usize,
    vuln_count: usize,
    critical_count: usize,
    high_count: usize,
    medium_count: usize,
    owasp_categories: BTreeSet<String>,
    start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub target: String,
    pub form_count: usize,
    pub api_count: usize,
    pub vuln_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub owasp_categories: BTreeSet<String>,
    pub start_time: DateTime<Utc>,
    pub elapsed_secs: i64,
    /// Elapsed time as `H:MM:SS`.
    pub elapsed: String,
}

impl ScanAggregate {
    pub fn new(target: impl Into<String>) -> Self {
        Self::started_at(target, Utc::now())
    }

    pub fn started_at(target: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            form_count: 0,
            api_count: 0,
            vuln_count: 0,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            owasp_categories: BTreeSet::new(),
            start_time,
        }
    }

    pub fn set_surface(&mut self, form_count: usize, api_count: usize) {
        self.form_count = form_count;
        self.api_count = api_count;
    }

    /// Count one finding. Critical findings land in their own bucket and
    /// leave the high/medium counters untouched.
    pub fn record(&mut self, severity: Severity, owasp_category: &str) {
        self.vuln_count += 1;
        self.owasp_categories.insert(owasp_category.to_string());
        match severity {
            Severity::High => self.high_count += 1,
            Severity::Medium => self.medium_count += 1,
            Severity::Critical => self.critical_count += 1,
        }
    }

    pub fn summarize(&self) -> ScanSummary {
        self.summarize_at(Utc::now())
    }

    pub fn summarize_at(&self, now: DateTime<Utc>) -> ScanSummary {
        let elapsed_secs = (now - self.start_time).num_seconds().max(0);
        ScanSummary {
            target: self.target.clone(),
            form_count: self.form_count,
            api_count: self.api_count,
            vuln_count: self.vuln_count,
            critical_count: self.critical_count,
            high_count: self.high_count,
            medium_count: self.medium_count,
            owasp_categories: self.owasp_categories.clone(),
            start_time: self.start_time,
            elapsed_secs,
            elapsed: format_elapsed(elapsed_secs),
        }
    }
}

fn format_elapsed(secs: i64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
