//! aaslint core library.
//!
//! This crate exposes programmatic APIs for validating Asset Administration
//! Shell files: discovery, a multi-engine orchestrator, and IDTA submodel
//! template conformance.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: `LintConfig` plus config-file discovery and precedence.
//! - `discovery`: Glob expansion, AAS content sniffing, package extraction.
//! - `engine`: The `ValidationEngine` trait every validator implements.
//! - `lint`: Orchestrator running engines per file, sorting and deduplicating.
//! - `templates`: Template index and conformance engine.
//! - `compliance`: Adapter for the external metamodel checker.
//! - `models`: Findings, locations, summaries, and results.
//! - `output`: Human/JSON/SARIF printers.
//! - `error`: Error enums.
//! - `utils`: Supporting helpers.
pub mod cli;
pub mod compliance;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod lint;
pub mod models;
pub mod output;
pub mod templates;
pub mod utils;

pub use config::LintConfig;
pub use engine::ValidationEngine;
pub use error::{DiscoveryError, EngineError, LintError};
pub use lint::Linter;
pub use models::{Finding, LintResult, Location, Severity, Summary};
