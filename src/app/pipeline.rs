//! Shared correction pipeline used by the interactive and headless front-ends.
//!
//! ingest -> retrieve transformers through a surface -> build and write the report
//!
//! The front-ends only decide which surface drives the session and what to
//! print.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{PluginConfig, REPORT_FILENAME};
use crate::correction::{CorrectionOrchestrator, FitResults, InteractiveSurface};
use crate::domain::DatasetSnapshot;
use crate::error::AppError;
use crate::fit::RegressionEngine;
use crate::io::DataIngestor;
use crate::report::ReportBuilder;

/// All computed outputs of a committed session.
#[derive(Debug)]
pub struct RunOutput {
    pub snapshot: DatasetSnapshot,
    pub results: FitResults,
    /// Final report document, identical to the file at `report_path`.
    pub document: String,
    pub report_path: PathBuf,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(RunOutput),
    /// The surface was closed without saving.
    Cancelled,
}

/// Run the pipeline, writing the report to `results.xml` in the working directory.
pub fn run_pipeline(
    config: &PluginConfig,
    wrapper: &str,
    surface: &mut dyn InteractiveSurface,
) -> Result<PipelineOutcome, AppError> {
    run_pipeline_in(config, wrapper, surface, Path::new(REPORT_FILENAME))
}

pub fn run_pipeline_in(
    config: &PluginConfig,
    wrapper: &str,
    surface: &mut dyn InteractiveSurface,
    report_path: &Path,
) -> Result<PipelineOutcome, AppError> {
    let ingestor = DataIngestor::new(config.decode_options());
    let snapshot = ingestor.parse(wrapper)?;
    debug!(
        path = %snapshot.filepath.display(),
        columns = snapshot.columns.len(),
        "dataset loaded"
    );

    let orchestrator = CorrectionOrchestrator::new(RegressionEngine::new(config.engine)).with_report_path(report_path);
    let Some(results) = orchestrator.retrieve(&snapshot.columns, surface)? else {
        return Ok(PipelineOutcome::Cancelled);
    };

    // Refits after the last save are kept too, so rewrite the final state.
    let reporter = ReportBuilder;
    let document = reporter.build(&snapshot.columns, &results);
    let report_path = reporter.dump_to(&document, report_path)?;
    info!(fitted = results.len(), "correction completed");

    Ok(PipelineOutcome::Completed(RunOutput {
        snapshot,
        results,
        document,
        report_path,
    }))
}
