//! Template index: semantic id -> required element paths.

use super::walk::{collect_paths, id_short_of, semantic_id_of, submodel_elements, WalkMode};
use glob::{glob, Pattern};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Version value that disables path filtering.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Required structure of one IDTA submodel template.
pub struct TemplateSpec {
    /// Semantic identifier of the template submodel.
    pub id: String,
    pub name: Option<String>,
    pub required_id_short_paths: BTreeSet<String>,
    pub required_semantic_paths: BTreeSet<String>,
    pub source_path: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct TemplateIndex {
    specs: BTreeMap<String, TemplateSpec>,
}

impl TemplateIndex {
    /// Index every template JSON under `dir`.
    ///
    /// Files are read in sorted path order; the first template seen for a
    /// semantic id wins. Unreadable or unparsable files are skipped.
    pub fn load(dir: &Path, version: Option<&str>) -> TemplateIndex {
        let mut index = TemplateIndex::default();
        for file in template_files(dir, version) {
            let doc = match fs::read_to_string(&file)
                .ok()
                .and_then(|s| serde_json::from_str::<Json>(&s).ok())
            {
                Some(d) => d,
                None => {
                    tracing::debug!(path = %file.display(), "skipping unreadable template");
                    continue;
                }
            };
            index.insert_document(&doc, &file);
        }
        tracing::debug!(dir = %dir.display(), templates = index.len(), "template index built");
        index
    }

    /// Add the submodels of one environment document. Returns how many new
    /// templates were registered.
    pub fn insert_document(&mut self, doc: &Json, source: &Path) -> usize {
        let Some(submodels) = doc.get("submodels").and_then(Json::as_array) else {
            return 0;
        };
        let mut added = 0;
        for sm in submodels {
            let Some(id) = semantic_id_of(sm) else {
                continue;
            };
            if self.specs.contains_key(&id) {
                continue;
            }
            let paths = collect_paths(submodel_elements(sm), WalkMode::Required);
            self.specs.insert(
                id.clone(),
                TemplateSpec {
                    id,
                    name: id_short_of(sm).map(String::from),
                    required_id_short_paths: paths.id_short,
                    required_semantic_paths: paths.semantic,
                    source_path: source.to_path_buf(),
                },
            );
            added += 1;
        }
        added
    }

    pub fn get(&self, semantic_id: &str) -> Option<&TemplateSpec> {
        self.specs.get(semantic_id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.specs.values()
    }
}

/// JSON files under `dir`, sorted, optionally restricted to paths that
/// contain a pinned version string.
fn template_files(dir: &Path, version: Option<&str>) -> Vec<PathBuf> {
    let pinned = version
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(LATEST));
    let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy()))
        .join("**")
        .join("*.json")
        .to_string_lossy()
        .to_string();
    let entries = match glob(&pattern) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "cannot enumerate templates");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file())
        .filter(|p| match pinned {
            Some(v) => p
                .strip_prefix(dir)
                .unwrap_or(p)
                .to_string_lossy()
                .contains(v),
            None => true,
        })
        .collect();
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn template(id: &str, name: &str, element: &str) -> Json {
        json!({
            "submodels": [{
                "idShort": name,
                "semanticId": { "type": "ExternalReference", "keys": [{ "type": "GlobalReference", "value": id }] },
                "submodelElements": [{ "idShort": element }],
            }]
        })
    }

    #[test]
    fn test_first_template_for_an_id_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/1/0")).unwrap();
        fs::create_dir_all(root.join("b/2/0")).unwrap();
        fs::write(
            root.join("a/1/0/nameplate.json"),
            template("urn:np", "Nameplate", "Old").to_string(),
        )
        .unwrap();
        fs::write(
            root.join("b/2/0/nameplate.json"),
            template("urn:np", "Nameplate", "New").to_string(),
        )
        .unwrap();
        fs::write(root.join("broken.json"), "{ nope").unwrap();

        let idx = TemplateIndex::load(root, None);
        assert_eq!(idx.len(), 1);
        let spec = idx.get("urn:np").unwrap();
        assert!(spec.required_id_short_paths.contains("Old"));
        assert_eq!(spec.name.as_deref(), Some("Nameplate"));
        assert!(spec.source_path.ends_with("a/1/0/nameplate.json"));
    }

    #[test]
    fn test_pinned_version_filters_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nameplate/2/0")).unwrap();
        fs::create_dir_all(root.join("nameplate/3/0")).unwrap();
        fs::write(
            root.join("nameplate/2/0/t.json"),
            template("urn:np", "Nameplate", "V2").to_string(),
        )
        .unwrap();
        fs::write(
            root.join("nameplate/3/0/t.json"),
            template("urn:np", "Nameplate", "V3").to_string(),
        )
        .unwrap();

        let v3 = TemplateIndex::load(root, Some("3/0"));
        assert!(v3.get("urn:np").unwrap().required_id_short_paths.contains("V3"));
        let latest = TemplateIndex::load(root, Some("latest"));
        assert!(latest.get("urn:np").unwrap().required_id_short_paths.contains("V2"));
        assert!(TemplateIndex::load(root, Some("9/9")).is_empty());
    }

    #[test]
    fn test_submodels_without_semantic_id_are_ignored() {
        let mut idx = TemplateIndex::default();
        let doc = json!({ "submodels": [{ "idShort": "Anon" }, { "semanticId": "urn:s" }] });
        assert_eq!(idx.insert_document(&doc, Path::new("/t.json")), 1);
        assert_eq!(idx.insert_document(&doc, Path::new("/u.json")), 0);
        assert_eq!(idx.iter().count(), 1);
    }
}
