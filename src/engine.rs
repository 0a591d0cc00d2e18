//! Validation engine contract.
//!
//! Engines are per-file validators. The orchestrator only knows them through
//! this trait and never inspects a concrete engine beyond its `name`.

use crate::config::LintConfig;
use crate::error::EngineError;
use crate::models::{rule_id, Finding, Location, Severity};
use std::path::Path;

/// Category and code of the synthetic finding for a failed engine run.
pub const INTERNAL_CATEGORY: &str = "internal";
pub const ENGINE_ERROR_CODE: &str = "engine-error";

pub trait ValidationEngine: Send + Sync {
    /// Unique engine name; first segment of every rule id it emits.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether this engine handles `path` at all.
    fn can_validate(&self, path: &Path) -> bool;

    /// Validate one file. An `Err` becomes a single `engine-error` finding.
    fn validate(&self, path: &Path, config: &LintConfig) -> Result<Vec<Finding>, EngineError>;
}

/// Build the finding reported in place of a failed engine run.
pub fn engine_error_finding(engine: &str, path: &Path, err: &EngineError) -> Finding {
    Finding {
        rule_id: rule_id(engine, INTERNAL_CATEGORY, ENGINE_ERROR_CODE),
        rule_name: "Engine error".into(),
        severity: Severity::Error,
        message: format!("{} failed: {}", engine, err),
        location: Location::file(path),
        source: engine.to_string(),
        details: None,
    }
}
