//! Template directory resolution.
//!
//! The first explicitly set directory wins: engine option, `templateDir`
//! from the lint config, then `AASLINT_TEMPLATE_DIR`. The platform cache is
//! consulted only when none of them is set. A chosen directory that does not
//! exist resolves to nothing. A `published` subdirectory is used when present.

use crate::config::LintConfig;
use std::path::{Path, PathBuf};

/// Environment override for the template directory.
pub const TEMPLATE_DIR_ENV: &str = "AASLINT_TEMPLATE_DIR";

const PUBLISHED: &str = "published";

#[derive(Debug, Clone, Default)]
pub struct TemplateLocator {
    /// Directory passed to the engine directly.
    pub option: Option<PathBuf>,
    /// Value of `AASLINT_TEMPLATE_DIR` captured at construction.
    pub env_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub dir: Option<PathBuf>,
    /// Whether the caller asked for template checks in any way.
    pub requested: bool,
}

impl TemplateLocator {
    /// Locator reading the environment override and platform cache path.
    pub fn from_env(option: Option<PathBuf>) -> Self {
        TemplateLocator {
            option,
            env_dir: std::env::var_os(TEMPLATE_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            cache_dir: platform_cache_dir(),
        }
    }

    pub fn resolve(&self, config: &LintConfig) -> Resolution {
        let config_dir = config.template_dir.as_ref().map(|d| match &config.base_path {
            Some(base) if d.is_relative() => base.join(d),
            _ => d.clone(),
        });
        let requested = self.option.is_some()
            || config.template_dir.is_some()
            || config.template_version.is_some()
            || self.env_dir.is_some();

        let dir = [self.option.clone(), config_dir, self.env_dir.clone()]
            .into_iter()
            .flatten()
            .next()
            .or_else(|| self.cache_dir.clone())
            .map(|d| prefer_published(&d))
            .filter(|d| d.is_dir());
        if dir.is_none() && requested {
            tracing::debug!("template directory not found");
        }
        Resolution { dir, requested }
    }
}

fn prefer_published(dir: &Path) -> PathBuf {
    let published = dir.join(PUBLISHED);
    if published.is_dir() {
        published
    } else {
        dir.to_path_buf()
    }
}

/// `aaslint/templates` under the platform's user cache directory.
pub fn platform_cache_dir() -> Option<PathBuf> {
    let base = if cfg!(windows) {
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join("Library").join("Caches"))
    } else {
        std::env::var_os("XDG_CACHE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))
    }?;
    Some(base.join("aaslint").join("templates"))
}
