//! IDTA submodel-template conformance engine.
//!
//! Matches instance submodels to indexed templates by semantic id and
//! reports template-required elements the instance lacks. Best-effort: with
//! no template directory the engine is silent, apart from a single note when
//! template checks were explicitly requested.
//!
//! A required path counts as present when it appears in either of the
//! instance's path sets (idShort or semantic). Templates do not always
//! spell out both forms consistently.

pub mod index;
pub mod source;
pub mod walk;

use crate::config::LintConfig;
use crate::discovery::{open_package, FileKind};
use crate::engine::ValidationEngine;
use crate::error::EngineError;
use crate::models::{rule_id, Finding, Location, Severity};
use index::{TemplateIndex, TemplateSpec, LATEST};
use serde_json::{json, Value as Json};
use source::TemplateLocator;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use walk::{collect_paths, id_short_of, semantic_id_of, submodel_elements, WalkMode};

pub const ENGINE_NAME: &str = "idta-template";
pub const MISSING_ELEMENT: &str = "missing-element";
pub const TEMPLATES_NOT_FOUND: &str = "templates-not-found";

struct CachedIndex {
    dir: PathBuf,
    version: String,
    index: Arc<TemplateIndex>,
}

pub struct TemplateEngine {
    locator: TemplateLocator,
    /// Built on first use, rebuilt when `(dir, version)` changes.
    cache: Mutex<Option<CachedIndex>>,
    notice_emitted: AtomicBool,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::with_locator(TemplateLocator::from_env(None))
    }

    /// Engine pinned to an explicit template directory.
    pub fn with_template_dir(dir: impl Into<PathBuf>) -> Self {
        Self::with_locator(TemplateLocator::from_env(Some(dir.into())))
    }

    pub fn with_locator(locator: TemplateLocator) -> Self {
        TemplateEngine {
            locator,
            cache: Mutex::new(None),
            notice_emitted: AtomicBool::new(false),
        }
    }

    fn index_for(&self, dir: &Path, version: &str) -> Arc<TemplateIndex> {
        let mut slot = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = slot.as_ref() {
            if cached.dir == dir && cached.version == version {
                return cached.index.clone();
            }
        }
        tracing::debug!(dir = %dir.display(), version, "building template index");
        let index = Arc::new(TemplateIndex::load(dir, Some(version)));
        *slot = Some(CachedIndex {
            dir: dir.to_path_buf(),
            version: version.to_string(),
            index: index.clone(),
        });
        index
    }

    fn templates_not_found(&self, path: &Path) -> Finding {
        let hint = self
            .locator
            .cache_dir
            .as_ref()
            .map(|d| format!(" or populate {}", d.display()))
            .unwrap_or_default();
        Finding {
            rule_id: rule_id(ENGINE_NAME, "config", TEMPLATES_NOT_FOUND),
            rule_name: "Templates not found".into(),
            severity: Severity::Note,
            message: format!(
                "IDTA template checks skipped: no template directory found. Set templateDir or {}{}.",
                source::TEMPLATE_DIR_ENV,
                hint
            ),
            location: Location::file(path),
            source: ENGINE_NAME.into(),
            details: None,
        }
    }
}

impl ValidationEngine for TemplateEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn description(&self) -> &str {
        "Checks submodels against IDTA submodel templates matched by semantic id"
    }

    fn can_validate(&self, path: &Path) -> bool {
        matches!(FileKind::of(path), Some(FileKind::Json) | Some(FileKind::Package))
    }

    fn validate(&self, path: &Path, config: &LintConfig) -> Result<Vec<Finding>, EngineError> {
        let resolution = self.locator.resolve(config);
        let Some(dir) = resolution.dir else {
            if resolution.requested && !self.notice_emitted.swap(true, Ordering::SeqCst) {
                return Ok(vec![self.templates_not_found(path)]);
            }
            return Ok(Vec::new());
        };
        let version = config.template_version.as_deref().unwrap_or(LATEST);
        let index = self.index_for(&dir, version);
        if index.is_empty() {
            return Ok(Vec::new());
        }

        match FileKind::of(path) {
            Some(FileKind::Json) => {
                let doc: Json = serde_json::from_str(&fs::read_to_string(path)?)?;
                Ok(check_document(&doc, &index, path, None))
            }
            Some(FileKind::Package) => {
                // Scratch directory is removed when `pkg` drops, on every path out.
                let pkg = open_package(path)?;
                if FileKind::of(&pkg.environment) != Some(FileKind::Json) {
                    tracing::debug!(
                        path = %path.display(),
                        environment = %pkg.environment.display(),
                        "package environment is not JSON, skipping template checks"
                    );
                    return Ok(Vec::new());
                }
                let doc: Json = serde_json::from_str(&fs::read_to_string(&pkg.environment)?)?;
                Ok(check_document(&doc, &index, path, Some(pkg.internal_path())))
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Compare every templated submodel of `doc` against its template.
pub fn check_document(
    doc: &Json,
    index: &TemplateIndex,
    path: &Path,
    internal_path: Option<String>,
) -> Vec<Finding> {
    let Some(submodels) = doc.get("submodels").and_then(Json::as_array) else {
        return Vec::new();
    };
    let mut findings = Vec::new();
    for (i, sm) in submodels.iter().enumerate() {
        let Some(spec) = semantic_id_of(sm).and_then(|id| index.get(&id)) else {
            continue;
        };
        let present = collect_paths(submodel_elements(sm), WalkMode::Present);
        let submodel_name = id_short_of(sm).unwrap_or(&spec.id);
        let required = spec
            .required_id_short_paths
            .iter()
            .map(|p| ("idShort", p))
            .chain(spec.required_semantic_paths.iter().map(|p| ("semantic", p)));
        for (kind, required_path) in required {
            if present.contains(required_path) {
                continue;
            }
            findings.push(missing_element(
                spec,
                submodel_name,
                kind,
                required_path,
                Location::file(path)
                    .with_pointer(format!("/submodels/{}", i))
                    .with_internal_path(internal_path.clone()),
            ));
        }
    }
    findings
}

fn missing_element(
    spec: &TemplateSpec,
    submodel: &str,
    kind: &str,
    missing: &str,
    location: Location,
) -> Finding {
    let template_name = spec.name.as_deref().unwrap_or(&spec.id);
    Finding {
        rule_id: rule_id(ENGINE_NAME, "structure", MISSING_ELEMENT),
        rule_name: "Missing template element".into(),
        severity: Severity::Error,
        message: format!(
            "Submodel '{}' is missing element '{}' required by template '{}'",
            submodel, missing, template_name
        ),
        location,
        source: ENGINE_NAME.into(),
        details: Some(json!({
            "templateId": spec.id,
            "templateName": template_name,
            "templateSource": spec.source_path.to_string_lossy(),
            "pathKind": kind,
            "missingPath": missing,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::tests::write_package;
    use tempfile::tempdir;

    const NAMEPLATE: &str = "https://admin-shell.io/zvei/nameplate/2/0/Nameplate";

    fn template_doc() -> Json {
        json!({
            "submodels": [{
                "idShort": "Nameplate",
                "semanticId": { "type": "ExternalReference", "keys": [{ "type": "Submodel", "value": NAMEPLATE }] },
                "submodelElements": [
                    { "idShort": "ManufacturerName" },
                    { "idShort": "SerialNumber", "qualifiers": [{ "type": "SMT/Cardinality", "value": "0..1" }] },
                ]
            }]
        })
    }

    fn instance_doc(semantic_id: Json, elements: Json) -> Json {
        json!({
            "assetAdministrationShells": [],
            "submodels": [
                { "idShort": "Unrelated", "semanticId": "urn:other", "submodelElements": [] },
                { "idShort": "Nameplate", "semanticId": semantic_id, "submodelElements": elements },
            ]
        })
    }

    fn engine_for(template_dir: &Path) -> TemplateEngine {
        TemplateEngine::with_locator(TemplateLocator {
            option: Some(template_dir.to_path_buf()),
            ..Default::default()
        })
    }

    fn setup() -> (tempfile::TempDir, PathBuf, LintConfig) {
        let dir = tempdir().unwrap();
        let templates = dir.path().join("templates/published/nameplate/2/0");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("nameplate.json"), template_doc().to_string()).unwrap();
        let mut cfg = LintConfig::with_paths(["*.json"]);
        cfg.base_path = Some(dir.path().to_path_buf());
        let tdir = dir.path().join("templates");
        (dir, tdir, cfg)
    }

    #[test]
    fn test_missing_template_dir_notes_instead_of_using_cache() {
        let (dir, tdir, mut cfg) = setup();
        let engine = TemplateEngine::with_locator(TemplateLocator {
            cache_dir: Some(tdir),
            ..Default::default()
        });
        cfg.template_dir = Some(PathBuf::from("typo-does-not-exist"));
        let file = dir.path().join("instance.json");
        fs::write(&file, instance_doc(json!(NAMEPLATE), json!([])).to_string()).unwrap();

        let findings = engine.validate(&file, &cfg).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "idta-template/config/templates-not-found");
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_element_reported_once() {
        let (dir, tdir, cfg) = setup();
        let file = dir.path().join("instance.json");
        fs::write(&file, instance_doc(json!(NAMEPLATE), json!([])).to_string()).unwrap();

        let findings = engine_for(&tdir).validate(&file, &cfg).unwrap();
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.rule_id, "idta-template/structure/missing-element");
        assert_eq!(f.severity, Severity::Error);
        assert!(f.message.contains("'ManufacturerName'"));
        assert_eq!(f.location.json_pointer.as_deref(), Some("/submodels/1"));
        assert!(f.location.internal_path.is_none());
        let details = f.details.as_ref().unwrap();
        assert_eq!(details["templateName"], "Nameplate");
        assert!(details["templateSource"].as_str().unwrap().ends_with("nameplate.json"));
    }

    #[test]
    fn test_semantic_id_forms_match_same_template() {
        let (dir, tdir, cfg) = setup();
        let engine = engine_for(&tdir);
        let forms = [
            json!(NAMEPLATE),
            json!({ "value": NAMEPLATE }),
            json!({ "keys": [{ "value": NAMEPLATE }] }),
        ];
        for (i, form) in forms.into_iter().enumerate() {
            let file = dir.path().join(format!("i{}.json", i));
            fs::write(&file, instance_doc(form, json!([])).to_string()).unwrap();
            assert_eq!(engine.validate(&file, &cfg).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_complete_instance_and_semantic_leniency() {
        let (dir, tdir, cfg) = setup();
        let engine = engine_for(&tdir);
        let file = dir.path().join("ok.json");
        fs::write(
            &file,
            instance_doc(json!(NAMEPLATE), json!([{ "idShort": "ManufacturerName" }])).to_string(),
        )
        .unwrap();
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());

        // An instance semantic path equal to the required idShort path also satisfies it.
        fs::write(
            &file,
            instance_doc(json!(NAMEPLATE), json!([{ "semanticId": "ManufacturerName" }])).to_string(),
        )
        .unwrap();
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());
    }

    #[test]
    fn test_missing_templates_note_emitted_once() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, instance_doc(json!(NAMEPLATE), json!([])).to_string()).unwrap();
        let engine = TemplateEngine::with_locator(TemplateLocator::default());

        let mut cfg = LintConfig::with_paths(["*.json"]);
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());

        cfg.template_dir = Some(dir.path().join("does-not-exist"));
        let first = engine.validate(&file, &cfg).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].severity, Severity::Note);
        assert_eq!(first[0].rule_id, "idta-template/config/templates-not-found");
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());
    }

    #[test]
    fn test_cache_rebuilds_when_version_changes() {
        let (dir, tdir, mut cfg) = setup();
        let engine = engine_for(&tdir);
        let file = dir.path().join("instance.json");
        fs::write(&file, instance_doc(json!(NAMEPLATE), json!([])).to_string()).unwrap();

        assert_eq!(engine.validate(&file, &cfg).unwrap().len(), 1);
        cfg.template_version = Some("3/0".into());
        assert!(engine.validate(&file, &cfg).unwrap().is_empty());
        cfg.template_version = Some("2/0".into());
        assert_eq!(engine.validate(&file, &cfg).unwrap().len(), 1);
    }

    #[test]
    fn test_package_instance_reports_internal_path() {
        let (dir, tdir, cfg) = setup();
        let pkg = dir.path().join("device.aasx");
        let env = instance_doc(json!(NAMEPLATE), json!([])).to_string();
        write_package(
            &pkg,
            &[
                ("[Content_Types].xml", "<Types/>"),
                ("aasx/device/device.aas.json", env.as_str()),
            ],
        );
        let findings = engine_for(&tdir).validate(&pkg, &cfg).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].location.internal_path.as_deref(),
            Some("aasx/device/device.aas.json")
        );
        assert_eq!(findings[0].location.file_path, pkg);
    }

    #[test]
    fn test_package_without_environment_is_an_error() {
        let (dir, tdir, cfg) = setup();
        let pkg = dir.path().join("empty.aasx");
        write_package(&pkg, &[("[Content_Types].xml", "<Types/>")]);
        assert!(matches!(
            engine_for(&tdir).validate(&pkg, &cfg),
            Err(EngineError::Package(_))
        ));
    }
}
