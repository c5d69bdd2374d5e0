//! Command-line parsing for the `abscor` plugin binary.
//!
//! Argument parsing and command dispatch stay separate from the correction
//! code; `app` maps these types onto the pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "abscor", version, about = "Absorption correction for emission line calibrations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Correct the columns of an instrument export and print the report.
    Run(RunArgs),
    /// Write a synthetic instrument export.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Host wrapper document `<input>PATH</input>`; defaults to `py_table.xml`
    /// in the working directory.
    #[arg(long, value_name = "XML")]
    pub config: Option<String>,

    /// Commit the initial fits without opening the terminal UI.
    #[arg(long)]
    pub headless: bool,

    /// Also export bounds, calibration points and comparison tables to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output file.
    #[arg(short, long, value_name = "XML")]
    pub output: PathBuf,

    /// Random seed for the waveform noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of calibration probes.
    #[arg(long, default_value_t = 8)]
    pub probes: usize,

    /// Replicate runs per probe.
    #[arg(long, default_value_t = 2)]
    pub parallels: usize,

    /// Samples per waveform.
    #[arg(long, default_value_t = 32)]
    pub size: usize,

    /// Name of the blank probe; pass an empty string to leave it out.
    #[arg(long, default_value = "Blank")]
    pub blank: String,
}
