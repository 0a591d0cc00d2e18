//! Adapter for the external AAS metamodel-compliance checker.
//!
//! The checker runs once per file as a subprocess. Its combined output is
//! parsed opportunistically: embedded JSON first, then a line heuristic. The
//! exit status only matters when neither parser recovers a violation.

use crate::config::LintConfig;
use crate::discovery::FileKind;
use crate::engine::ValidationEngine;
use crate::error::EngineError;
use crate::models::{rule_id, Finding, Location, Severity};
use regex::Regex;
use serde_json::{json, Map, Value as Json};
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

pub const ENGINE_NAME: &str = "aas-compliance";

/// Default program and leading arguments.
pub const DEFAULT_COMMAND: &[&str] = &["aas_test_engines", "check_file"];

const MESSAGE_KEYS: &[&str] = &["message", "msg", "description", "error", "text"];
const LEVEL_KEYS: &[&str] = &["level", "severity", "type"];
const PATH_KEYS: &[&str] = &["path", "jsonPath", "json_path", "pointer", "location"];

/// Longest output excerpt attached to a check-failed finding.
const EXCERPT_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One violation recovered from checker output.
pub struct Violation {
    pub message: String,
    pub level: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    /// `Some(false)` when the checker reported the document invalid.
    pub valid: Option<bool>,
    pub violations: Vec<Violation>,
}

pub struct ComplianceEngine {
    program: String,
    args: Vec<String>,
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        ComplianceEngine {
            program: DEFAULT_COMMAND[0].to_string(),
            args: DEFAULT_COMMAND[1..].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ComplianceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `command[0]` as the program and the rest as leading arguments.
    /// An empty command keeps the default.
    pub fn with_command(command: &[String]) -> Self {
        match command.split_first() {
            Some((program, args)) => ComplianceEngine {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => Self::default(),
        }
    }

    fn to_findings(&self, path: &Path, parsed: ParsedOutput, exit: Option<i32>, output: &str) -> Vec<Finding> {
        if !parsed.violations.is_empty() {
            return parsed
                .violations
                .into_iter()
                .map(|v| violation_finding(path, v))
                .collect();
        }
        let failed_exit = exit.map(|c| c != 0).unwrap_or(true);
        if parsed.valid == Some(false) || (parsed.valid.is_none() && failed_exit) {
            let reason = match exit {
                Some(code) if code != 0 => format!("exit code {}", code),
                Some(_) => "reported invalid".to_string(),
                None => "terminated by signal".to_string(),
            };
            let excerpt: String = output.trim().chars().take(EXCERPT_LIMIT).collect();
            return vec![Finding {
                rule_id: rule_id(ENGINE_NAME, "metamodel", "check-failed"),
                rule_name: "Compliance check failed".into(),
                severity: Severity::Error,
                message: format!("Metamodel compliance check failed ({})", reason),
                location: Location::file(path),
                source: ENGINE_NAME.into(),
                details: (!excerpt.is_empty()).then(|| json!({ "output": excerpt })),
            }];
        }
        Vec::new()
    }
}

impl ValidationEngine for ComplianceEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn description(&self) -> &str {
        "AAS metamodel compliance via the external test-engines checker"
    }

    fn can_validate(&self, path: &Path) -> bool {
        FileKind::of(path).is_some()
    }

    fn validate(&self, path: &Path, _config: &LintConfig) -> Result<Vec<Finding>, EngineError> {
        let Some(kind) = FileKind::of(path) else {
            return Ok(Vec::new());
        };
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .arg("--format")
            .arg(kind.as_str())
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let mut combined = String::from_utf8_lossy(&out.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&out.stderr));
        let combined = strip_ansi(&combined);
        let parsed = parse_checker_output(&combined, Some(path));
        tracing::debug!(
            path = %path.display(),
            violations = parsed.violations.len(),
            status = ?out.status.code(),
            "compliance check finished"
        );
        Ok(self.to_findings(path, parsed, out.status.code(), &combined))
    }
}

fn violation_finding(path: &Path, v: Violation) -> Finding {
    let mut location = Location::file(path);
    let mut details = Map::new();
    match v.path {
        Some(p) if p.starts_with('/') => location.json_pointer = Some(p),
        Some(p) => {
            details.insert("path".into(), Json::String(p));
        }
        None => {}
    }
    if let Some(level) = &v.level {
        details.insert("level".into(), Json::String(level.clone()));
    }
    Finding {
        rule_id: rule_id(ENGINE_NAME, "metamodel", "violation"),
        rule_name: "Metamodel violation".into(),
        severity: v
            .level
            .as_deref()
            .map(Severity::from_level)
            .unwrap_or(Severity::Error),
        message: v.message,
        location,
        source: ENGINE_NAME.into(),
        details: (!details.is_empty()).then_some(Json::Object(details)),
    }
}

/// Remove terminal color and cursor escape sequences.
pub fn strip_ansi(s: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("static regex"));
    re.replace_all(s, "").into_owned()
}

/// Recover violations from checker output: JSON first, then text lines.
pub fn parse_output(output: &str) -> ParsedOutput {
    parse_checker_output(output, None)
}

/// Like [`parse_output`], ignoring echoes of the checked file's own path.
pub fn parse_checker_output(output: &str, subject: Option<&Path>) -> ParsedOutput {
    if let Some(parsed) = parse_json_output(output) {
        if !parsed.violations.is_empty() || parsed.valid.is_some() {
            return parsed;
        }
    }
    ParsedOutput {
        valid: None,
        violations: parse_text_output(output, subject),
    }
}

fn parse_json_output(output: &str) -> Option<ParsedOutput> {
    let trimmed = output.trim();
    let value = serde_json::from_str::<Json>(trimmed).ok().or_else(|| {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Json>(&trimmed[start..=end]).ok()
    })?;
    match &value {
        Json::Array(items) => Some(ParsedOutput {
            valid: None,
            violations: items.iter().filter_map(violation_from_json).collect(),
        }),
        Json::Object(obj) => {
            let valid = obj.get("valid").and_then(Json::as_bool);
            let list = obj
                .get("violations")
                .or_else(|| obj.get("errors"))
                .and_then(Json::as_array);
            if valid.is_none() && list.is_none() {
                return None;
            }
            Some(ParsedOutput {
                valid,
                violations: list
                    .map(|items| items.iter().filter_map(violation_from_json).collect())
                    .unwrap_or_default(),
            })
        }
        _ => None,
    }
}

fn violation_from_json(item: &Json) -> Option<Violation> {
    match item {
        Json::String(s) => Some(Violation {
            message: s.trim().to_string(),
            level: None,
            path: None,
        })
        .filter(|v| !v.message.is_empty()),
        Json::Object(obj) => {
            let message = first_string(obj, MESSAGE_KEYS)?;
            Some(Violation {
                message,
                level: first_string(obj, LEVEL_KEYS),
                path: first_string(obj, PATH_KEYS),
            })
        }
        _ => None,
    }
}

fn first_string(obj: &Map<String, Json>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Json::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Json::Array(parts) if !parts.is_empty() => Some(
                parts
                    .iter()
                    .map(|p| p.as_str().map(String::from).unwrap_or_else(|| p.to_string()))
                    .collect::<Vec<_>>()
                    .join("/"),
            ),
            _ => None,
        })
}

/// Keep lines that carry a path marker or a violation keyword.
///
/// A path is either an explicit `path:`/`@` marker or a pointer rooted at an
/// environment collection. Echoes of `subject` (the file handed to the
/// checker) are blanked before matching.
fn parse_text_output(output: &str, subject: Option<&Path>) -> Vec<Violation> {
    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    static PATH_MARKER: OnceLock<Regex> = OnceLock::new();
    static POINTER: OnceLock<Regex> = OnceLock::new();
    let keywords = KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)not allowed|missing|invalid|violat|expected").expect("static regex")
    });
    let marker = PATH_MARKER.get_or_init(|| {
        Regex::new(r"(?i)(?:\bpath\s*[:=]|(?:^|\s)@)\s*(\S+)").expect("static regex")
    });
    let pointer = POINTER.get_or_init(|| {
        Regex::new(
            r"(?:^|\s)(/(?:submodels|assetAdministrationShells|conceptDescriptions)(?:/[A-Za-z0-9_.~\[\]-]+)*)",
        )
        .expect("static regex")
    });
    let subject = subject
        .map(|p| p.display().to_string())
        .filter(|s| !s.is_empty());

    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let scrubbed = match &subject {
                Some(s) => line.replace(s.as_str(), ""),
                None => line.to_string(),
            };
            let path = marker
                .captures(&scrubbed)
                .or_else(|| pointer.captures(&scrubbed))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim_end_matches([',', ';', ':']).to_string())
                .filter(|p| !p.is_empty());
            if path.is_none() && !keywords.is_match(&scrubbed) {
                return None;
            }
            let message = line
                .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '✗' | '✘' | '×') || c.is_whitespace())
                .to_string();
            Some(Violation {
                message,
                level: None,
                path,
            })
        })
        .collect()
}
