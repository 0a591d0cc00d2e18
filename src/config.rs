//! Lint configuration and effective settings resolution.
//!
//! aaslint reads `aaslint.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `paths`: `**/*.aasx`, `**/*.json`, `**/*.xml`
//! - `failOn`: `["error"]`
//! - `output`: `human`
//! - `templateVersion`: unset (treated as `latest`)
//! - `engines`: every registered engine enabled
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Patterns used when neither CLI nor config file name any paths.
pub const DEFAULT_PATTERNS: &[&str] = &["**/*.aasx", "**/*.json", "**/*.xml"];

const CONFIG_TOML: &str = "aaslint.toml";
const CONFIG_YAML: [&str; 2] = ["aaslint.yaml", "aaslint.yml"];

fn default_fail_on() -> Vec<Severity> {
    vec![Severity::Error]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Input to a lint run, also embedded in the result as an audit record.
pub struct LintConfig {
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default = "default_fail_on")]
    pub fail_on: Vec<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    /// Engine name -> enabled. Missing names are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<BTreeMap<String, bool>>,
}

impl Default for LintConfig {
    fn default() -> Self {
        LintConfig {
            paths: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            fail_on: default_fail_on(),
            template_version: None,
            template_dir: None,
            base_path: None,
            engines: None,
        }
    }
}

impl LintConfig {
    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LintConfig {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Default-on: only an explicit `false` disables an engine.
    pub fn engine_enabled(&self, name: &str) -> bool {
        self.engines
            .as_ref()
            .and_then(|m| m.get(name).copied())
            .unwrap_or(true)
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Settings for the external compliance checker under `[compliance]`.
pub struct ComplianceCfg {
    /// Program followed by leading arguments.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Root configuration loaded from `aaslint.toml|yaml`.
pub struct FileConfig {
    pub paths: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub fail_on: Option<Vec<Severity>>,
    pub template_version: Option<String>,
    pub template_dir: Option<String>,
    pub base_path: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub engines: Option<BTreeMap<String, bool>>, // [engines] name = false
    #[serde(default)]
    pub compliance: Option<ComplianceCfg>,
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line. `None`/empty means "not given".
pub struct Overrides {
    pub repo_root: Option<String>,
    pub paths: Vec<String>,
    pub exclude: Vec<String>,
    pub fail_on: Vec<Severity>,
    pub template_version: Option<String>,
    pub template_dir: Option<String>,
    pub base_path: Option<String>,
    pub disabled_engines: Vec<String>,
    pub output: Option<String>,
    pub compliance_command: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by the binary after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_found: bool,
    pub lint: LintConfig,
    pub output: String,
    pub compliance_command: Option<Vec<String>>,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when an `aaslint.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if cur.join(CONFIG_TOML).exists() || CONFIG_YAML.iter().any(|y| cur.join(y).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `FileConfig` from `aaslint.toml` or `aaslint.yaml|yml` if present.
pub fn load_config(root: &Path) -> Option<FileConfig> {
    let toml_path = root.join(CONFIG_TOML);
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path).ok()?;
        return match toml::from_str::<FileConfig>(&s) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %toml_path.display(), error = %e, "ignoring invalid config");
                None
            }
        };
    }
    for yml in CONFIG_YAML {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p).ok()?;
            return match serde_yaml::from_str::<FileConfig>(&s) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "ignoring invalid config");
                    None
                }
            };
        }
    }
    None
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &Overrides) -> Effective {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let start = std::path::absolute(&start).unwrap_or(start);
    let repo_root = detect_repo_root(&start);
    let file = load_config(&repo_root);
    let config_found = file.is_some();
    let cfg = file.unwrap_or_default();

    let paths = if !cli.paths.is_empty() {
        cli.paths.clone()
    } else {
        cfg.paths
            .unwrap_or_else(|| DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect())
    };

    // Excludes accumulate: config entries first, CLI entries appended.
    let mut exclude = cfg.exclude.unwrap_or_default();
    exclude.extend(cli.exclude.iter().cloned());

    let fail_on = if !cli.fail_on.is_empty() {
        cli.fail_on.clone()
    } else {
        cfg.fail_on.unwrap_or_else(default_fail_on)
    };

    let template_version = cli.template_version.clone().or(cfg.template_version);

    // Paths from the config file are relative to the repository root.
    let template_dir = cli
        .template_dir
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| cfg.template_dir.map(|d| repo_root.join(d)));
    let base_path = cli
        .base_path
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| cfg.base_path.map(|d| repo_root.join(d)))
        .unwrap_or_else(|| repo_root.clone());

    let mut engines = cfg.engines.unwrap_or_default();
    for name in &cli.disabled_engines {
        engines.insert(name.clone(), false);
    }

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let compliance_command = cli
        .compliance_command
        .clone()
        .or_else(|| cfg.compliance.and_then(|c| c.command));

    Effective {
        repo_root,
        config_found,
        lint: LintConfig {
            paths,
            exclude,
            fail_on,
            template_version,
            template_dir,
            base_path: Some(base_path),
            engines: if engines.is_empty() { None } else { Some(engines) },
        },
        output,
        compliance_command,
    }
}
