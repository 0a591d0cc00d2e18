//! CLI argument parsing via `clap`.

use crate::models::Severity;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "aaslint",
    version,
    about = "Lint Asset Administration Shell files in CI",
    long_about = "aaslint: validate AAS environments (.aasx, .json, .xml) with the external metamodel checker and IDTA submodel templates.\n\nConfiguration precedence: CLI > aaslint.toml > defaults.",
    after_help = "Examples:\n  aaslint lint\n  aaslint lint 'models/**/*.aasx' --output sarif > aaslint.sarif\n  aaslint lint --template-dir ../submodel-templates --template-version 3/0\n  aaslint engines",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current aaslint version.")]
    Version,
    /// Lint AAS files
    #[command(
        about = "Run lint checks",
        long_about = "Discover AAS files, run every enabled engine on each, and print sorted, deduplicated findings. Severities listed in --fail-on make the exit status 1.",
        after_help = "Examples:\n  aaslint lint '**/*.aasx' --exclude 'fixtures/**'\n  aaslint lint --output json --fail-on error --fail-on warning"
    )]
    Lint {
        #[arg(help = "Glob patterns relative to the base path (default: **/*.aasx, **/*.json, **/*.xml)")]
        paths: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Glob pattern to exclude (repeatable)")]
        exclude: Vec<String>,
        #[arg(long, value_parser = parse_severity, help = "Severity that fails the run (repeatable; default: error)")]
        fail_on: Vec<Severity>,
        #[arg(long, help = "IDTA template version filter, e.g. 3/0 (default: latest)")]
        template_version: Option<String>,
        #[arg(long, help = "Directory holding IDTA submodel templates")]
        template_dir: Option<String>,
        #[arg(long, help = "Directory patterns are resolved against (default: repository root)")]
        base_path: Option<String>,
        #[arg(long, help = "Disable an engine by name (repeatable)")]
        disable_engine: Vec<String>,
        #[arg(long, help = "Output mode: human|json|sarif (default: human)")]
        output: Option<String>,
        #[arg(long, num_args = 1.., value_delimiter = ' ', help = "Compliance checker command, program first")]
        compliance_command: Option<Vec<String>>,
    },
    /// List available engines
    #[command(about = "List engines", long_about = "List validation engines and whether the current configuration enables them.")]
    Engines {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
    },
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}
