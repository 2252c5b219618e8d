use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub origin: String,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: Option<String>, origin: &str) -> Self {
        Self {
            name: name.into(),
            description: description.filter(|value| !value.trim().is_empty()),
            origin: origin.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscoveryReport {
    pub tools: Vec<ToolInfo>,
    pub files_scanned: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_evidence(has_server_declaration: bool, has_registration_pattern: bool) -> Self {
        match (has_server_declaration, has_registration_pattern) {
            (true, true) => Confidence::High,
            (true, false) | (false, true) => Confidence::Medium,
            (false, false) => Confidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DetectionEvidence {
    pub has_server_declaration: bool,
    pub has_registration_pattern: bool,
    pub evidence_files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConfidenceResult {
    pub is_likely_server: bool,
    pub confidence: Confidence,
    pub evidence: DetectionEvidence,
}

impl From<DetectionEvidence> for ConfidenceResult {
    fn from(evidence: DetectionEvidence) -> Self {
        let confidence = Confidence::from_evidence(
            evidence.has_server_declaration,
            evidence.has_registration_pattern,
        );
        ConfidenceResult {
            is_likely_server: confidence != Confidence::Low,
            confidence,
            evidence,
        }
    }
}

/// Why a repository in a batch produced no analysis.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanFailure {
    AcquireFailed { reason: String },
    Timeout { seconds: u64 },
    NoSupportedFiles,
    AnalysisFailed { reason: String },
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFailure::AcquireFailed { reason } => write!(f, "acquisition failed: {reason}"),
            ScanFailure::Timeout { seconds } => write!(f, "acquisition timed out after {seconds}s"),
            ScanFailure::NoSupportedFiles => f.write_str("no files of a supported language"),
            ScanFailure::AnalysisFailed { reason } => write!(f, "analysis failed: {reason}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepoScanOutcome {
    pub repository: String,
    pub tools: Vec<ToolInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<ConfidenceResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ScanFailure>,
}

impl RepoScanOutcome {
    pub fn failed(repository: &str, failure: ScanFailure) -> Self {
        Self {
            repository: repository.to_string(),
            tools: Vec::new(),
            verification: None,
            failure: Some(failure),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_table() {
        assert_eq!(Confidence::from_evidence(true, true), Confidence::High);
        assert_eq!(Confidence::from_evidence(true, false), Confidence::Medium);
        assert_eq!(Confidence::from_evidence(false, true), Confidence::Medium);
        assert_eq!(Confidence::from_evidence(false, false), Confidence::Low);
    }

    #[test]
    fn both_signals_never_rank_below_one() {
        let both = Confidence::from_evidence(true, true);
        assert!(both >= Confidence::from_evidence(true, false));
        assert!(both >= Confidence::from_evidence(false, true));
        let neither = ConfidenceResult::from(DetectionEvidence::default());
        assert_eq!(neither.confidence, Confidence::Low);
        assert!(!neither.is_likely_server);
    }

    #[test]
    fn empty_description_is_dropped() {
        let tool = ToolInfo::new("echo", Some("   ".to_string()), "server.ts");
        assert_eq!(tool.description, None);
    }

    #[test]
    fn failure_serializes_with_kind_tag() {
        let value = serde_json::to_value(ScanFailure::Timeout { seconds: 5 }).unwrap();
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["seconds"], 5);
    }
}
