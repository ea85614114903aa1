use serde::{Deserialize, Serialize};
use std::fmt;

pub const OWASP_INJECTION: &str = "A03:2021 - Injection";
pub const OWASP_AUTH_FAILURES: &str = "A07:2021 - Identification and Authentication Failures";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnerabilityKind {
    SqlInjection,
    BlindSqlInjection,
    NoSqlBypass,
    NoSqlError,
    AuthBypass,
}

impl VulnerabilityKind {
    pub fn label(&self) -> &'static str {
        match self {
            VulnerabilityKind::SqlInjection => "SQL Injection",
            VulnerabilityKind::BlindSqlInjection => "Blind SQL Injection",
            VulnerabilityKind::NoSqlBypass => "NoSQL Injection (Bypass)",
            VulnerabilityKind::NoSqlError => "NoSQL Injection (Error)",
            VulnerabilityKind::AuthBypass => "Auth Bypass",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            VulnerabilityKind::SqlInjection => Severity::High,
            VulnerabilityKind::BlindSqlInjection | VulnerabilityKind::NoSqlError => {
                Severity::Medium
            }
            VulnerabilityKind::NoSqlBypass | VulnerabilityKind::AuthBypass => Severity::Critical,
        }
    }

    pub fn owasp_category(&self) -> &'static str {
        match self {
            VulnerabilityKind::AuthBypass => OWASP_AUTH_FAILURES,
            _ => OWASP_INJECTION,
        }
    }
}

impl fmt::Display for VulnerabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A confirmed signal against one parameter of one endpoint.
///
/// Severity and OWASP category follow from the kind, so they cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    kind: VulnerabilityKind,
    endpoint: String,
    parameter: String,
}

impl Finding {
    pub fn new(
        kind: VulnerabilityKind,
        endpoint: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            parameter: parameter.into(),
        }
    }

    pub fn kind(&self) -> VulnerabilityKind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn owasp_category(&self) -> &'static str {
        self.kind.owasp_category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_table() {
        let expected = [
            (VulnerabilityKind::SqlInjection, "SQL Injection", Severity::High, OWASP_INJECTION),
            (VulnerabilityKind::BlindSqlInjection, "Blind SQL Injection", Severity::Medium, OWASP_INJECTION),
            (VulnerabilityKind::NoSqlBypass, "NoSQL Injection (Bypass)", Severity::Critical, OWASP_INJECTION),
            (VulnerabilityKind::NoSqlError, "NoSQL Injection (Error)", Severity::Medium, OWASP_INJECTION),
            (VulnerabilityKind::AuthBypass, "Auth Bypass", Severity::Critical, OWASP_AUTH_FAILURES),
        ];

        for (kind, label, severity, owasp) in expected {
            assert_eq!(kind.label(), label);
            assert_eq!(kind.severity(), severity);
            assert_eq!(kind.owasp_category(), owasp);
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("low"), None);
        assert_eq!(Severity::Medium.to_string(), "Medium");
    }

    #[test]
    fn test_finding_derives_from_kind() {
        let finding = Finding::new(VulnerabilityKind::NoSqlBypass, "http://t/api/login", "pass");
        assert_eq!(finding.severity(), Severity::Critical);
        assert_eq!(finding.owasp_category(), OWASP_INJECTION);
        assert_eq!(finding.parameter(), "pass");
    }
}
