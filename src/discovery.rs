//! File discovery and AASX package helpers.
//!
//! `discover` turns glob patterns into a sorted, filtered list of absolute
//! candidate paths. Package helpers unpack `.aasx` archives into a scratch
//! directory and locate the environment document inside.

use crate::error::{DiscoveryError, PackageError};
use glob::{glob, Pattern};
use regex::Regex;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

/// Directory names skipped regardless of caller excludes.
pub const ALWAYS_EXCLUDED: &[&str] = &[".git", "node_modules"];

/// Top-level array keys that mark a JSON document as an AAS environment.
pub const ENVIRONMENT_KEYS: &[&str] = &[
    "assetAdministrationShells",
    "submodels",
    "conceptDescriptions",
];

/// Canonical environment locations inside an extracted package, in order.
const CANONICAL_ENVIRONMENTS: &[&str] = &[
    "aasx/aas.json",
    "aasx/aas.xml",
    "aasx/environment.json",
    "aasx/environment.xml",
    "aas.json",
    "aas.xml",
    "environment.json",
    "environment.xml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Input format derived from a file extension.
pub enum FileKind {
    Package,
    Json,
    Xml,
}

impl FileKind {
    pub fn of(path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "aasx" => Some(FileKind::Package),
            "json" => Some(FileKind::Json),
            "xml" => Some(FileKind::Xml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Package => "aasx",
            FileKind::Json => "json",
            FileKind::Xml => "xml",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub base_path: PathBuf,
    pub exclude: Vec<String>,
    pub follow_symlinks: bool,
}

/// Expand `patterns` against `opts.base_path` and return matching AAS files.
///
/// - Relative patterns are joined onto the base path.
/// - `.git` and `node_modules` are always skipped.
/// - JSON files must look like an AAS environment; other JSON is dropped.
/// - Output is deduplicated and sorted by absolute path.
pub fn discover(patterns: &[String], opts: &DiscoverOptions) -> Result<Vec<PathBuf>, DiscoveryError> {
    let base = std::path::absolute(&opts.base_path).map_err(|source| DiscoveryError::BasePath {
        path: opts.base_path.clone(),
        source,
    })?;
    let meta = fs::metadata(&base).map_err(|source| DiscoveryError::BasePath {
        path: base.clone(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(DiscoveryError::BasePath {
            path: base,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "base path is not a directory"),
        });
    }

    let excludes = opts
        .exclude
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| DiscoveryError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Keyed by the path string so ordering is plain lexicographic.
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    for pat in patterns {
        let pattern = if Path::new(pat).is_absolute() {
            pat.clone()
        } else {
            Path::new(&Pattern::escape(&base.to_string_lossy()))
                .join(pat)
                .to_string_lossy()
                .to_string()
        };
        let entries = glob(&pattern).map_err(|source| DiscoveryError::InvalidPattern {
            pattern: pat.clone(),
            source,
        })?;
        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable glob entry");
                    continue;
                }
            };
            if !accept(&path, &base, &excludes, opts.follow_symlinks) {
                continue;
            }
            found.insert(path.to_string_lossy().to_string(), path);
        }
    }
    Ok(found.into_values().collect())
}

fn accept(path: &Path, base: &Path, excludes: &[Pattern], follow_symlinks: bool) -> bool {
    let rel = path.strip_prefix(base).unwrap_or(path);
    if is_always_excluded(rel) {
        return false;
    }
    if excludes
        .iter()
        .any(|ex| ex.matches_path(rel) || ex.matches_path(path))
    {
        return false;
    }
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };
    if meta.file_type().is_symlink() && !follow_symlinks {
        return false;
    }
    if !path.is_file() {
        return false;
    }
    match FileKind::of(path) {
        Some(FileKind::Json) => is_environment_json(path),
        Some(FileKind::Package) | Some(FileKind::Xml) => true,
        None => false,
    }
}

fn is_always_excluded(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| ALWAYS_EXCLUDED.contains(&s))
            .unwrap_or(false)
    })
}

/// Content sniff: true when the file parses as a JSON object holding at
/// least one environment array.
pub fn is_environment_json(path: &Path) -> bool {
    let data = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let json: Json = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(_) => {
            tracing::debug!(path = %path.display(), "not JSON, skipping");
            return false;
        }
    };
    looks_like_environment(&json)
}

pub fn looks_like_environment(json: &Json) -> bool {
    match json {
        Json::Object(obj) => ENVIRONMENT_KEYS
            .iter()
            .any(|k| obj.get(*k).map(Json::is_array).unwrap_or(false)),
        _ => false,
    }
}

/// Extract a ZIP-based package into `dest`.
pub fn extract_package(archive: &Path, dest: &Path) -> Result<(), PackageError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    Ok(())
}

/// Locate the environment document inside an extracted package tree.
pub fn find_environment_file(root: &Path) -> Option<PathBuf> {
    for rel in CANONICAL_ENVIRONMENTS {
        let candidate = root.join(rel);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if let Some(p) = origin_target(root) {
        return Some(p);
    }
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .find(|p| {
            let rel = p.strip_prefix(root).unwrap_or(p);
            !is_opc_bookkeeping(rel)
                && matches!(FileKind::of(p), Some(FileKind::Json) | Some(FileKind::Xml))
        })
}

/// Follow the `aas-spec` relationship of the `aasx-origin` part.
fn origin_target(root: &Path) -> Option<PathBuf> {
    static REL: OnceLock<Regex> = OnceLock::new();
    let re = REL.get_or_init(|| {
        Regex::new(r#"<Relationship\b[^>]*>"#).expect("static regex")
    });
    static TARGET: OnceLock<Regex> = OnceLock::new();
    let target_re =
        TARGET.get_or_init(|| Regex::new(r#"Target\s*=\s*"([^"]+)""#).expect("static regex"));
    let rels = fs::read_to_string(root.join("aasx/_rels/aasx-origin.rels")).ok()?;
    for m in re.find_iter(&rels) {
        let tag = m.as_str();
        if !tag.contains("aas-spec") {
            continue;
        }
        let Some(target) = target_re.captures(tag).and_then(|c| c.get(1)) else {
            continue;
        };
        let target = target.as_str();
        let rel = target.trim_start_matches('/');
        let candidate = if target.starts_with('/') {
            root.join(rel)
        } else {
            root.join("aasx").join(rel)
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn is_opc_bookkeeping(rel: &Path) -> bool {
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name == "[Content_Types].xml"
        || name.ends_with(".rels")
        || name == "aasx-origin"
        || rel.components().any(|c| c.as_os_str() == "_rels")
}

/// A package unpacked into a scratch directory. The directory is removed
/// when this value is dropped.
pub struct ExtractedPackage {
    scratch: TempDir,
    pub environment: PathBuf,
}

impl ExtractedPackage {
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// Environment path relative to the package root, `/`-separated.
    pub fn internal_path(&self) -> String {
        let rel = self
            .environment
            .strip_prefix(self.scratch.path())
            .unwrap_or(&self.environment);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Extract `archive` into a fresh scratch directory and locate its environment.
pub fn open_package(archive: &Path) -> Result<ExtractedPackage, PackageError> {
    let scratch = tempfile::Builder::new().prefix("aaslint-").tempdir()?;
    extract_package(archive, scratch.path())?;
    let environment = find_environment_file(scratch.path())
        .ok_or_else(|| PackageError::NoEnvironment(archive.to_path_buf()))?;
    Ok(ExtractedPackage {
        scratch,
        environment,
    })
}
