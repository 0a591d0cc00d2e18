//! Shared data models for findings, lint results, and run metadata.
//!
//! Every type here serializes with camelCase keys so the JSON printer and
//! downstream SARIF/annotation tooling see one stable shape.

use crate::config::LintConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Finding severity. Closed set; anything else fails to deserialize.
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }

    /// Lenient mapping for levels reported by external tools.
    pub fn from_level(level: &str) -> Severity {
        let l = level.trim().to_ascii_lowercase();
        if l.starts_with("warn") {
            Severity::Warning
        } else if l.starts_with("note") || l.starts_with("info") || l.starts_with("hint") {
            Severity::Note
        } else {
            Severity::Error
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "note" | "info" => Ok(Severity::Note),
            other => Err(format!("unknown severity '{}' (expected error|warning|note)", other)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Where a finding points. `file_path` is always absolute.
pub struct Location {
    pub file_path: PathBuf,
    /// Path of the environment document inside a package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_path: Option<String>,
    /// RFC 6901 pointer into the environment document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn file(path: &Path) -> Self {
        Location {
            file_path: path.to_path_buf(),
            internal_path: None,
            json_pointer: None,
            line: None,
            column: None,
        }
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.json_pointer = Some(pointer.into());
        self
    }

    pub fn with_internal_path(mut self, internal: Option<String>) -> Self {
        self.internal_path = internal;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A single normalized validation result.
pub struct Finding {
    /// `{engine}/{category}/{code}`.
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    /// Name of the engine that produced the finding.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Json>,
}

/// Compose a rule id from the triple `(engine, category, code)`.
pub fn rule_id(engine: &str, category: &str, code: &str) -> String {
    format!("{}/{}/{}", engine, category, code)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Aggregated counts used by printers and CI policy.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub notes: usize,
    pub files_scanned: usize,
    pub files_with_findings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Audit record of a run.
pub struct Metadata {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub version: String,
    pub config: LintConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Lint results container handed to printers.
pub struct LintResult {
    pub findings: Vec<Finding>,
    pub summary: Summary,
    pub metadata: Metadata,
}

impl LintResult {
    /// True when any finding's severity is in `fail_on`.
    pub fn exceeds(&self, fail_on: &[Severity]) -> bool {
        self.findings.iter().any(|f| fail_on.contains(&f.severity))
    }
}
