//! Error types.
//!
//! `DiscoveryError` aborts a run. `EngineError` never does: the orchestrator
//! turns it into an `engine-error` finding for the file being validated.

use std::path::PathBuf;

/// Fatal errors raised while resolving the set of files to lint.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("base path '{}' is not readable: {source}", path.display())]
    BasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by `Linter::lint`.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Errors while unpacking an AASX package.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("package I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("package is not a readable archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no environment document found in package '{}'", .0.display())]
    NoEnvironment(PathBuf),
}

/// Per-file engine failures. Recovered by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Message(String),
}
