//! Lint orchestrator: discovery, per-file engine fan-out, normalization.
//!
//! Produces a `LintResult` whose findings are sorted and deduplicated so CI
//! output is stable across runs regardless of engine completion order.

use crate::config::LintConfig;
use crate::discovery::{discover, DiscoverOptions};
use crate::engine::{engine_error_finding, ValidationEngine};
use crate::error::{DiscoveryError, EngineError, LintError};
use crate::models::{Finding, LintResult, Metadata, Severity, Summary};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Holds registered engines and runs them over discovered files.
#[derive(Default)]
pub struct Linter {
    engines: Vec<Box<dyn ValidationEngine>>,
}

impl Linter {
    pub fn new() -> Self {
        Linter {
            engines: Vec::new(),
        }
    }

    /// Register an engine. Registration order is the per-file result order
    /// before normalization.
    pub fn register_engine(&mut self, engine: Box<dyn ValidationEngine>) {
        self.engines.push(engine);
    }

    pub fn engines(&self) -> impl Iterator<Item = &dyn ValidationEngine> {
        self.engines.iter().map(|e| e.as_ref())
    }

    /// Run every enabled engine over the files matched by `config`.
    ///
    /// - Files are processed one at a time in discovery order.
    /// - Engines applicable to a file run concurrently on the rayon pool.
    /// - An engine error or panic becomes one `engine-error` finding.
    ///
    /// Only discovery failures are returned as `Err`.
    pub fn lint(&self, config: &LintConfig) -> Result<LintResult, LintError> {
        let start_time = chrono::Utc::now();
        let started = Instant::now();

        let base_path = match config.base_path.clone() {
            Some(p) => p,
            None => std::env::current_dir().map_err(|source| DiscoveryError::BasePath {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let files = discover(
            &config.paths,
            &DiscoverOptions {
                base_path,
                exclude: config.exclude.clone(),
                follow_symlinks: false,
            },
        )?;
        tracing::debug!(files = files.len(), "discovery finished");

        let active: Vec<&dyn ValidationEngine> = self
            .engines()
            .filter(|e| config.engine_enabled(e.name()))
            .collect();

        let mut raw: Vec<Finding> = Vec::new();
        for file in &files {
            let applicable: Vec<&dyn ValidationEngine> = active
                .iter()
                .copied()
                .filter(|e| e.can_validate(file))
                .collect();
            let per_engine: Vec<Vec<Finding>> = applicable
                .par_iter()
                .map(|engine| run_engine(*engine, file, config))
                .collect();
            raw.extend(per_engine.into_iter().flatten());
        }

        let findings = normalize(raw);
        let summary = summarize(&findings, files.len());
        Ok(LintResult {
            findings,
            summary,
            metadata: Metadata {
                start_time,
                duration_ms: started.elapsed().as_millis() as u64,
                version: env!("CARGO_PKG_VERSION").to_string(),
                config: config.clone(),
            },
        })
    }
}

fn run_engine(engine: &dyn ValidationEngine, file: &Path, config: &LintConfig) -> Vec<Finding> {
    let outcome = catch_unwind(AssertUnwindSafe(|| engine.validate(file, config)))
        .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload.as_ref()))));
    match outcome {
        Ok(findings) => findings,
        Err(e) => {
            tracing::warn!(
                engine = engine.name(),
                path = %file.display(),
                error = %e,
                "engine failed"
            );
            vec![engine_error_finding(engine.name(), file, &e)]
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Stable sort by `(file, line, rule)` with missing lines last, then drop
/// repeats of `(file, pointer, line, rule, message)`.
pub fn normalize(mut findings: Vec<Finding>) -> Vec<Finding> {
    findings.sort_by(compare_findings);
    let mut seen = HashSet::new();
    findings.retain(|f| {
        seen.insert((
            f.location.file_path.clone(),
            f.location.json_pointer.clone(),
            f.location.line,
            f.rule_id.clone(),
            f.message.clone(),
        ))
    });
    findings
}

fn compare_findings(a: &Finding, b: &Finding) -> Ordering {
    a.location
        .file_path
        .as_os_str()
        .cmp(b.location.file_path.as_os_str())
        .then_with(|| match (a.location.line, b.location.line) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

pub fn summarize(findings: &[Finding], files_scanned: usize) -> Summary {
    let mut summary = Summary {
        files_scanned,
        ..Default::default()
    };
    let mut files = HashSet::new();
    for f in findings {
        match f.severity {
            Severity::Error => summary.errors += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Note => summary.notes += 1,
        }
        files.insert(f.location.file_path.as_path());
    }
    summary.files_with_findings = files.len();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{rule_id, Location};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn finding(engine: &str, file: &Path, line: Option<u32>, code: &str, msg: &str) -> Finding {
        let mut location = Location::file(file).with_pointer("/submodels/0");
        location.line = line;
        Finding {
            rule_id: rule_id(engine, "test", code),
            rule_name: code.into(),
            severity: Severity::Warning,
            message: msg.into(),
            location,
            source: engine.into(),
            details: None,
        }
    }

    /// Emits a fixed finding per file.
    struct Fixed {
        name: &'static str,
        message: &'static str,
        line: Option<u32>,
    }

    impl ValidationEngine for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fixed"
        }
        fn can_validate(&self, _path: &Path) -> bool {
            true
        }
        fn validate(&self, path: &Path, _config: &LintConfig) -> Result<Vec<Finding>, EngineError> {
            Ok(vec![finding("shared", path, self.line, "dup", self.message)])
        }
    }

    /// Always fails; counts how often it was asked.
    struct Broken {
        calls: Arc<AtomicUsize>,
        panic: bool,
    }

    impl ValidationEngine for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn can_validate(&self, _path: &Path) -> bool {
            true
        }
        fn validate(&self, _path: &Path, _config: &LintConfig) -> Result<Vec<Finding>, EngineError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if self.panic {
                panic!("boom");
            }
            Err(EngineError::Message("cannot run".into()))
        }
    }

    /// Only validates `.xml` files, one finding per line number given.
    struct XmlOnly;

    impl ValidationEngine for XmlOnly {
        fn name(&self) -> &str {
            "xml-only"
        }
        fn description(&self) -> &str {
            "xml"
        }
        fn can_validate(&self, path: &Path) -> bool {
            path.extension().map(|e| e == "xml").unwrap_or(false)
        }
        fn validate(&self, path: &Path, _config: &LintConfig) -> Result<Vec<Finding>, EngineError> {
            Ok(vec![
                finding("xml-only", path, None, "b", "no line"),
                finding("xml-only", path, Some(9), "a", "line nine"),
                finding("xml-only", path, Some(2), "z", "line two"),
            ])
        }
    }

    fn workspace() -> (tempfile::TempDir, LintConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("b.json"), r#"{"submodels": []}"#).unwrap();
        fs::write(root.join("a.xml"), "<environment/>").unwrap();
        fs::write(root.join("ignored.json"), r#"{"other": 1}"#).unwrap();
        let mut cfg = LintConfig::with_paths(["*.json", "*.xml"]);
        cfg.base_path = Some(root);
        (dir, cfg)
    }

    #[test]
    fn test_identical_findings_from_two_engines_collapse() {
        let (_dir, cfg) = workspace();
        let mut linter = Linter::new();
        for name in ["one", "two"] {
            linter.register_engine(Box::new(Fixed {
                name,
                message: "same",
                line: None,
            }));
        }
        let res = linter.lint(&cfg).unwrap();
        assert_eq!(res.summary.files_scanned, 2);
        assert_eq!(res.findings.len(), 2, "one per file after dedup");
        assert_eq!(res.summary.files_with_findings, 2);
        assert_eq!(res.summary.warnings, 2);
    }

    #[test]
    fn test_distinct_messages_survive_dedup() {
        let (_dir, cfg) = workspace();
        let mut linter = Linter::new();
        linter.register_engine(Box::new(Fixed {
            name: "one",
            message: "first",
            line: None,
        }));
        linter.register_engine(Box::new(Fixed {
            name: "two",
            message: "second",
            line: None,
        }));
        let res = linter.lint(&cfg).unwrap();
        assert_eq!(res.findings.len(), 4);
    }

    #[test]
    fn test_failing_engine_is_isolated() {
        let (_dir, cfg) = workspace();
        for panic in [false, true] {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut linter = Linter::new();
            linter.register_engine(Box::new(Broken {
                calls: calls.clone(),
                panic,
            }));
            linter.register_engine(Box::new(Fixed {
                name: "ok",
                message: "still here",
                line: None,
            }));
            let res = linter.lint(&cfg).unwrap();
            let engine_errors: Vec<_> = res
                .findings
                .iter()
                .filter(|f| f.rule_id == "broken/internal/engine-error")
                .collect();
            assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
            assert_eq!(engine_errors.len(), 2);
            assert!(engine_errors.iter().all(|f| f.severity == Severity::Error
                && f.location.line.is_none()
                && f.location.json_pointer.is_none()
                && f.source == "broken"));
            assert_eq!(
                res.findings.iter().filter(|f| f.message == "still here").count(),
                2
            );
        }
    }

    #[test]
    fn test_sort_contract_and_applicability() {
        let (_dir, cfg) = workspace();
        let mut linter = Linter::new();
        linter.register_engine(Box::new(XmlOnly));
        linter.register_engine(Box::new(Fixed {
            name: "all",
            message: "m",
            line: Some(5),
        }));
        let res = linter.lint(&cfg).unwrap();
        let got: Vec<(String, Option<u32>, String)> = res
            .findings
            .iter()
            .map(|f| {
                (
                    f.location.file_path.file_name().unwrap().to_string_lossy().to_string(),
                    f.location.line,
                    f.rule_id.clone(),
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("a.xml".into(), Some(2), "xml-only/test/z".into()),
                ("a.xml".into(), Some(5), "shared/test/dup".into()),
                ("a.xml".into(), Some(9), "xml-only/test/a".into()),
                ("a.xml".into(), None, "xml-only/test/b".into()),
                ("b.json".into(), Some(5), "shared/test/dup".into()),
            ]
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        let (_dir, cfg) = workspace();
        let mut linter = Linter::new();
        linter.register_engine(Box::new(XmlOnly));
        linter.register_engine(Box::new(Fixed {
            name: "all",
            message: "m",
            line: None,
        }));
        let a = serde_json::to_string(&linter.lint(&cfg).unwrap().findings).unwrap();
        let b = serde_json::to_string(&linter.lint(&cfg).unwrap().findings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_disabled_engine_is_skipped_and_config_recorded() {
        let (_dir, mut cfg) = workspace();
        cfg.engines = Some([("one".to_string(), false)].into_iter().collect());
        let mut linter = Linter::new();
        linter.register_engine(Box::new(Fixed {
            name: "one",
            message: "m",
            line: None,
        }));
        let res = linter.lint(&cfg).unwrap();
        assert!(res.findings.is_empty());
        assert_eq!(res.summary.files_scanned, 2);
        assert_eq!(res.summary.files_with_findings, 0);
        assert_eq!(res.metadata.config, cfg);
        assert_eq!(res.metadata.version, env!("CARGO_PKG_VERSION"));
    }

    fn template_workspace() -> (tempfile::TempDir, PathBuf, LintConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let templates = root.join("templates/nameplate/2/0");
        fs::create_dir_all(&templates).unwrap();
        let template = serde_json::json!({
            "submodels": [{
                "idShort": "Nameplate",
                "semanticId": { "keys": [{ "value": "urn:nameplate" }] },
                "submodelElements": [{ "idShort": "ManufacturerName" }]
            }]
        });
        fs::write(templates.join("nameplate.json"), template.to_string()).unwrap();
        let instance = serde_json::json!({
            "submodels": [{ "idShort": "Nameplate", "semanticId": "urn:nameplate", "submodelElements": [] }]
        });
        for name in ["c.json", "a.json", "b.json"] {
            fs::write(root.join(name), instance.to_string()).unwrap();
        }
        let mut cfg = LintConfig::with_paths(["*.json"]);
        cfg.base_path = Some(root.clone());
        (dir, root.join("templates"), cfg)
    }

    #[test]
    fn test_template_engine_over_several_files() {
        use crate::templates::source::TemplateLocator;
        use crate::templates::TemplateEngine;

        let (_dir, templates, mut cfg) = template_workspace();
        let mut linter = Linter::new();
        linter.register_engine(Box::new(TemplateEngine::with_locator(TemplateLocator::default())));
        cfg.template_dir = Some(PathBuf::from("no-such-templates"));
        let res = linter.lint(&cfg).unwrap();
        assert_eq!(res.summary.files_scanned, 3);
        assert_eq!(res.findings.len(), 1, "note is emitted once per run");
        assert_eq!(res.findings[0].rule_id, "idta-template/config/templates-not-found");
        assert_eq!(res.summary.notes, 1);

        let mut linter = Linter::new();
        linter.register_engine(Box::new(TemplateEngine::with_locator(TemplateLocator::default())));
        cfg.template_dir = Some(templates);
        let res = linter.lint(&cfg).unwrap();
        let got: Vec<(String, Option<String>, String)> = res
            .findings
            .iter()
            .map(|f| {
                (
                    f.location.file_path.file_name().unwrap().to_string_lossy().to_string(),
                    f.location.json_pointer.clone(),
                    f.rule_id.clone(),
                )
            })
            .collect();
        let expected: Vec<(String, Option<String>, String)> = ["a.json", "b.json", "c.json"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    Some("/submodels/0".to_string()),
                    "idta-template/structure/missing-element".to_string(),
                )
            })
            .collect();
        assert_eq!(got, expected);
        assert_eq!(res.summary.errors, 3);
        assert_eq!(res.summary.files_with_findings, 3);
        assert!(res.exceeds(&[Severity::Error]));
    }

    #[test]
    fn test_discovery_error_is_fatal() {
        let (_dir, mut cfg) = workspace();
        cfg.paths = vec!["[".into()];
        let linter = Linter::new();
        assert!(matches!(
            linter.lint(&cfg),
            Err(LintError::Discovery(DiscoveryError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn test_normalize_keeps_distinct_pointers() {
        let file = Path::new("/x/a.json");
        let a = finding("e", file, None, "c", "m");
        let mut b = a.clone();
        b.location.json_pointer = Some("/submodels/1".into());
        let out = normalize(vec![a.clone(), b, a]);
        assert_eq!(out.len(), 2);
    }
}
