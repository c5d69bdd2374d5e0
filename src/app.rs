//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the plugin configuration and installs logging
//! - runs the correction pipeline through the chosen surface
//! - prints the report (or the failure document) for the host

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Command, RunArgs, SynthArgs};
use crate::config::PluginConfig;
use crate::correction::{HeadlessSurface, InteractiveSurface};
use crate::data::synthetic::{self, SynthConfig};
use crate::error::AppError;
use crate::io::filepath::wrapper_for;
use crate::report::ReportBuilder;
use crate::tui::TerminalSurface;

pub mod pipeline;

use pipeline::PipelineOutcome;

/// Instrument export the host leaves in the working directory.
pub const DEFAULT_DATA_FILE: &str = "py_table.xml";

/// Entry point for the `abscor` binary.
pub fn run() -> Result<(), AppError> {
    // The host starts the plugin without arguments; that means `abscor run`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = PluginConfig::from_env()?;
    crate::logging::init(&config)?;

    let wrapper = match args.config {
        Some(wrapper) => wrapper,
        None => default_wrapper()?,
    };

    let mut surface: Box<dyn InteractiveSurface> = if args.headless {
        Box::new(HeadlessSurface)
    } else {
        Box::new(TerminalSurface)
    };

    let reporter = ReportBuilder;
    match pipeline::run_pipeline(&config, &wrapper, surface.as_mut()) {
        Ok(PipelineOutcome::Completed(run)) => {
            println!("{}", run.document);
            if let Some(path) = &args.export {
                crate::io::write_results_json(path, &run.snapshot.columns, &run.results)?;
                info!(path = %path.display(), "results exported");
            }
            Ok(())
        }
        Ok(PipelineOutcome::Cancelled) => {
            info!("correction cancelled by the user");
            println!("{}", reporter.failure_document());
            Ok(())
        }
        Err(err) => {
            error!(exit_code = err.exit_code(), "{err}");
            println!("{}", reporter.failure_document());
            Err(err)
        }
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let blank = args.blank.trim();
    let config = SynthConfig {
        seed: args.seed,
        probes: args.probes,
        parallels: args.parallels,
        size: args.size,
        blank: (!blank.is_empty()).then(|| blank.to_string()),
        ..SynthConfig::default()
    };

    let document = synthetic::generate(&config)?;
    std::fs::write(&args.output, document)
        .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", args.output.display())))?;

    println!("Wrote {}", args.output.display());
    Ok(())
}

/// `<input>{cwd}/py_table.xml</input>`.
fn default_wrapper() -> Result<String, AppError> {
    let cwd: PathBuf = std::env::current_dir()
        .map_err(|e| AppError::new(2, format!("Failed to read the working directory: {e}")))?;
    Ok(wrapper_for(&cwd.join(DEFAULT_DATA_FILE)))
}

/// Rewrite argv so `abscor` defaults to `abscor run`.
///
/// Rules:
/// - `abscor`                       -> `abscor run`
/// - `abscor --headless ...`        -> `abscor run --headless ...`
/// - `abscor --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if matches!(arg1.as_str(), "run" | "synth") {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
