//! aaslint CLI binary entry point.
//! Resolves configuration, registers engines, runs the linter and prints results.

use aaslint::cli::{Cli, Commands};
use aaslint::compliance::ComplianceEngine;
use aaslint::config::{self, Effective, Overrides};
use aaslint::lint::Linter;
use aaslint::templates::TemplateEngine;
use aaslint::{output, utils};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Log filter variable, e.g. `AASLINT_LOG=aaslint=debug`.
const LOG_ENV: &str = "AASLINT_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_linter(eff: &Effective) -> Linter {
    let mut linter = Linter::new();
    let compliance = match eff.compliance_command.as_deref() {
        Some(cmd) => ComplianceEngine::with_command(cmd),
        None => ComplianceEngine::new(),
    };
    linter.register_engine(Box::new(compliance));
    linter.register_engine(Box::new(TemplateEngine::new()));
    linter
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Engines { repo_root } => {
            let eff = config::resolve_effective(&Overrides {
                repo_root,
                ..Default::default()
            });
            for engine in build_linter(&eff).engines() {
                let state = if eff.lint.engine_enabled(engine.name()) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!("{:<16} {:<9} {}", engine.name(), state, engine.description());
            }
        }
        Commands::Lint {
            paths,
            repo_root,
            exclude,
            fail_on,
            template_version,
            template_dir,
            base_path,
            disable_engine,
            output,
            compliance_command,
        } => {
            let eff = config::resolve_effective(&Overrides {
                repo_root,
                paths,
                exclude,
                fail_on,
                template_version,
                template_dir,
                base_path,
                disabled_engines: disable_engine,
                output,
                compliance_command,
            });
            if !matches!(eff.output.as_str(), "human" | "json" | "sarif") {
                eprintln!(
                    "{} unknown output mode '{}' (expected human|json|sarif)",
                    utils::error_prefix(),
                    eff.output
                );
                std::process::exit(2);
            }
            if !eff.config_found && eff.output == "human" {
                eprintln!("{} No aaslint.toml found; using defaults.", utils::note_prefix());
            }
            if eff.output == "human" {
                eprintln!(
                    "{} Linting [{}] under {}",
                    utils::info_prefix(),
                    eff.lint.paths.join(", "),
                    eff.repo_root.display()
                );
            }

            let linter = build_linter(&eff);
            let result = match linter.lint(&eff.lint) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("{} {}", utils::error_prefix(), e);
                    std::process::exit(2);
                }
            };
            if let Err(e) = output::print_lint(&result, &eff.output) {
                eprintln!("{} failed to render output: {}", utils::error_prefix(), e);
                std::process::exit(2);
            }
            if result.exceeds(&eff.lint.fail_on) {
                std::process::exit(1);
            }
        }
    }
}
