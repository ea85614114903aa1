//! Injection probes, scan aggregation, CSV reporting and scan history for
//! Breach.

pub mod data;
pub mod error;
pub mod finding;
pub mod inject;
pub mod payloads;
pub mod report;
pub mod scan;
pub mod state;

pub use error::{CoreError, Result};
pub use finding::{Finding, Severity, VulnerabilityKind};
pub use inject::{FindingSink, Injector, ProbeConfig};
pub use scan::{ScanHooks, ScanOptions, ScanOutcome, ScanPhase, run_scan};
pub use state::{ScanAggregate, ScanSummary};
