use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::discover::{Location, ParamResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FindingKind {
    /// Backed by DOM evidence or a fired dialog
    #[serde(rename = "V")]
    Verified,
    /// Unescaped reflection only
    #[serde(rename = "R")]
    Reflected,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Verified => "V",
            FindingKind::Reflected => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
}

impl From<FindingKind> for Severity {
    fn from(kind: FindingKind) -> Self {
        match kind {
            FindingKind::Verified => Severity::High,
            FindingKind::Reflected => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub inject_type: String,
    pub method: String,
    /// Request URL, or the navigated URL for headless items
    pub data: String,
    pub param: String,
    pub location: Location,
    pub payload: String,
    pub evidence: String,
    pub severity: Severity,
    pub cwe: String,
    pub message: String,
}

impl Finding {
    /// Attribute breakouts are CWE-83, everything else CWE-79.
    pub fn cwe_for(inject_type: &str) -> &'static str {
        if inject_type.contains("inATTR") {
            "CWE-83"
        } else {
            "CWE-79"
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}][{}] {} param={} payload={}",
            self.kind.as_str(),
            self.method,
            self.inject_type,
            self.data,
            self.param,
            self.payload
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub target: String,
    pub params: Vec<ParamResult>,
    pub pocs: Vec<Finding>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ScanResult {
    pub fn verified(&self) -> impl Iterator<Item = &Finding> {
        self.pocs.iter().filter(|f| f.kind == FindingKind::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwe_by_family() {
        assert_eq!(Finding::cwe_for("inATTR-double"), "CWE-83");
        assert_eq!(Finding::cwe_for("inHTML-none"), "CWE-79");
        assert_eq!(Finding::cwe_for("toBlind"), "CWE-79");
    }

    #[test]
    fn kind_serializes_short() {
        assert_eq!(serde_json::to_string(&FindingKind::Verified).unwrap(), "\"V\"");
        assert_eq!(Severity::from(FindingKind::Reflected), Severity::Medium);
    }
}
