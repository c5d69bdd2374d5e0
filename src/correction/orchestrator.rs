//! Per-column correction workflow.
//!
//! `retrieve` fits every column once, hands the fits to the interactive
//! surface, then serves the surface's refit/commit requests until it returns.
//!
//! Bounds for a refit without explicit bounds resolve in this order:
//!
//! 1. bounds persisted by a previous run (seeded once, never re-estimated)
//! 2. the engine's automatic estimate
//!
//! The transformer map lives in the session and is only touched while a
//! request is being served. A failed fit is recorded and aborts `retrieve`
//! even if the surface ignores the error it was handed; a later commit is
//! refused, so no report is written for a faulted session.
//!
//! Columns with an empty calibration table are skipped with a warning: they
//! get no initial fit and are left out of the report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::REPORT_FILENAME;
use crate::correction::compare::comparison_table;
use crate::correction::protocol::{
    FitComputed, InteractiveSurface, SessionHandle, SurfaceReply, SurfaceRequest,
};
use crate::domain::{Bounds, ColumnDatum, ColumnMap};
use crate::error::{CorrectionError, FitError, StateError};
use crate::fit::{FitEngine, Transformer};
use crate::report::ReportBuilder;

/// Fitted transformer for one column and the bounds it was fitted with.
#[derive(Debug)]
pub struct FitResult {
    pub transformer: Box<dyn Transformer>,
    pub bounds: Bounds,
}

pub type FitResults = HashMap<String, FitResult>;

#[derive(Debug, Clone, Copy)]
enum BoundsChoice {
    Explicit(Bounds),
    Resolve,
    Estimate,
}

pub struct CorrectionOrchestrator<E: FitEngine> {
    engine: E,
    reporter: ReportBuilder,
    report_path: PathBuf,
}

impl<E: FitEngine> CorrectionOrchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            reporter: ReportBuilder,
            report_path: PathBuf::from(REPORT_FILENAME),
        }
    }

    /// Write the committed report to `path` instead of `results.xml`.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Run a correction session.
    ///
    /// Returns `Some(results)` when the surface committed, `None` when it was
    /// closed without committing.
    pub fn retrieve(
        &self,
        columns: &ColumnMap,
        surface: &mut dyn InteractiveSurface,
    ) -> Result<Option<FitResults>, CorrectionError> {
        if columns.iter().all(|c| c.table.is_empty()) {
            info!(columns = columns.len(), "no calibration data to correct");
            return Ok(Some(FitResults::new()));
        }

        let started = Instant::now();
        debug!(columns = columns.len(), "start restoring transformers");

        let mut session = Session {
            engine: &self.engine,
            reporter: &self.reporter,
            report_path: &self.report_path,
            columns,
            results: FitResults::new(),
            fault: None,
            committed: false,
        };

        let outcome = session
            .fit_all()
            .and_then(|initial| surface.run(columns, initial, &mut session));
        info!(elapsed_s = started.elapsed().as_secs_f64(), "restoring finished");

        if let Some(fault) = session.fault.take() {
            return Err(fault);
        }
        outcome?;

        if session.committed {
            Ok(Some(session.results))
        } else {
            info!("session closed without commit");
            Ok(None)
        }
    }
}

struct Session<'a, E: FitEngine> {
    engine: &'a E,
    reporter: &'a ReportBuilder,
    report_path: &'a Path,
    columns: &'a ColumnMap,
    results: FitResults,
    fault: Option<CorrectionError>,
    committed: bool,
}

impl<E: FitEngine> Session<'_, E> {
    fn fit_all(&mut self) -> Result<Vec<FitComputed>, CorrectionError> {
        let columns = self.columns;
        columns
            .iter()
            .filter(|column| {
                let has_data = !column.table.is_empty();
                if !has_data {
                    warn!(column_id = %column.column_id, "column has no calibration rows; skipped");
                }
                has_data
            })
            .map(|column| self.update(&column.column_id, BoundsChoice::Resolve))
            .collect()
    }

    fn update(&mut self, column_id: &str, choice: BoundsChoice) -> Result<FitComputed, CorrectionError> {
        let column = self
            .columns
            .get(column_id)
            .ok_or_else(|| CorrectionError::UnknownColumn(column_id.to_string()))?;

        match self.fit_column(column, choice) {
            Ok((result, computed)) => {
                debug!(
                    column_id,
                    lb = computed.bounds.lb(),
                    ub = computed.bounds.ub(),
                    rows = computed.comparison.len(),
                    "column fitted"
                );
                self.results.insert(column_id.to_string(), result);
                Ok(computed)
            }
            Err(err) => {
                error!(column_id, error = %err, "fit failed");
                self.results.remove(column_id);
                if self.fault.is_none() {
                    self.fault = Some(CorrectionError::fit(column_id, &err));
                }
                Err(CorrectionError::fit(column_id, &err))
            }
        }
    }

    fn fit_column(
        &self,
        column: &ColumnDatum,
        choice: BoundsChoice,
    ) -> Result<(FitResult, FitComputed), FitError> {
        let input = self.engine.prepare(&column.table)?;
        let bounds = match (choice, column.bounds) {
            (BoundsChoice::Explicit(bounds), _) => bounds,
            (BoundsChoice::Resolve, Some(persisted)) => persisted,
            (BoundsChoice::Resolve, None) | (BoundsChoice::Estimate, _) => self.engine.estimate_bounds(&input)?,
        };

        let transformer = self.engine.fit(&input, bounds)?;
        let comparison = comparison_table(&column.table, transformer.as_ref());

        Ok((
            FitResult {
                transformer,
                bounds,
            },
            FitComputed {
                column_id: column.column_id.clone(),
                bounds,
                comparison,
            },
        ))
    }

    fn finalize(&mut self) -> Result<PathBuf, CorrectionError> {
        if self.fault.is_some() {
            return Err(StateError::Faulted.into());
        }
        if self.results.is_empty() {
            return Err(StateError::NothingFitted.into());
        }

        let document = self.reporter.build(self.columns, &self.results);
        let path = self.reporter.dump_to(&document, self.report_path)?;
        self.committed = true;
        Ok(path)
    }
}

impl<E: FitEngine> SessionHandle for Session<'_, E> {
    fn send(&mut self, request: SurfaceRequest) -> Result<SurfaceReply, CorrectionError> {
        match request {
            SurfaceRequest::Fit { column_id, bounds } => {
                let choice = bounds.map_or(BoundsChoice::Resolve, BoundsChoice::Explicit);
                self.update(&column_id, choice).map(SurfaceReply::FitComputed)
            }
            SurfaceRequest::Estimate { column_id } => self
                .update(&column_id, BoundsChoice::Estimate)
                .map(SurfaceReply::FitComputed),
            SurfaceRequest::Commit => {
                let report_path = self.finalize()?;
                Ok(SurfaceReply::Committed { report_path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::domain::{CalibrationTable, Sample};
    use crate::error::RegressionError;
    use crate::fit::FitInput;

    #[derive(Debug)]
    struct Doubling(Bounds);

    impl Transformer for Doubling {
        fn bounds(&self) -> Bounds {
            self.0
        }

        fn apply(&self, intensity: f64) -> f64 {
            2.0 * intensity
        }

        fn estimate_intensity(&self, concentration: f64) -> f64 {
            concentration
        }
    }

    #[derive(Default)]
    struct StubEngine {
        singular: bool,
        estimates: Cell<usize>,
    }

    impl FitEngine for StubEngine {
        fn estimate_bounds(&self, _input: &FitInput) -> Result<Bounds, FitError> {
            self.estimates.set(self.estimates.get() + 1);
            Ok(Bounds::new(1.0, 3.0)?)
        }

        fn fit(&self, _input: &FitInput, bounds: Bounds) -> Result<Box<dyn Transformer>, FitError> {
            if self.singular {
                return Err(RegressionError::Singular.into());
            }
            if bounds.lb() < 0.0 {
                return Err(FitError::EmptyDomain {
                    lb: bounds.lb(),
                    ub: bounds.ub(),
                });
            }
            Ok(Box::new(Doubling(bounds)))
        }
    }

    type Script = Box<dyn FnMut(&[FitComputed], &mut dyn SessionHandle) -> Result<(), CorrectionError>>;

    struct ScriptedSurface {
        runs: usize,
        initial: Vec<FitComputed>,
        script: Script,
    }

    impl ScriptedSurface {
        fn new(
            script: impl FnMut(&[FitComputed], &mut dyn SessionHandle) -> Result<(), CorrectionError> + 'static,
        ) -> Self {
            Self {
                runs: 0,
                initial: Vec::new(),
                script: Box::new(script),
            }
        }
    }

    impl InteractiveSurface for ScriptedSurface {
        fn run(
            &mut self,
            _columns: &ColumnMap,
            initial: Vec<FitComputed>,
            session: &mut dyn SessionHandle,
        ) -> Result<(), CorrectionError> {
            self.runs += 1;
            self.initial = initial;
            (self.script)(&self.initial, session)
        }
    }

    fn column(id: &str, bounds: Option<Bounds>) -> ColumnDatum {
        ColumnDatum {
            column_id: id.to_string(),
            nickname: format!("line {id}"),
            table: CalibrationTable::new(vec![
                Sample::point("S2", "1", 2.0, 2.0),
                Sample::point("S1", "1", 1.0, 1.0),
                Sample::point("S3", "1", 3.0, 2.5),
            ]),
            bounds,
            prior_curve: None,
        }
    }

    fn orchestrator(engine: StubEngine, dir: &tempfile::TempDir) -> CorrectionOrchestrator<StubEngine> {
        CorrectionOrchestrator::new(engine).with_report_path(dir.path().join(REPORT_FILENAME))
    }

    #[test]
    fn zero_columns_do_not_start_the_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = ScriptedSurface::new(|_, _| Ok(()));

        let results = orchestrator(StubEngine::default(), &dir)
            .retrieve(&ColumnMap::new(), &mut surface)
            .unwrap();

        assert!(results.unwrap().is_empty());
        assert_eq!(surface.runs, 0);
    }

    #[test]
    fn persisted_bounds_skip_estimation() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = Bounds::new(0.5, 2.5).unwrap();
        let columns: ColumnMap = [column("1", Some(persisted)), column("2", None)].into_iter().collect();
        let orchestrator = orchestrator(StubEngine::default(), &dir);

        let mut surface = ScriptedSurface::new(move |_, session| {
            let refit = session.fit("1", None)?;
            assert_eq!(refit.bounds, persisted);
            Ok(())
        });
        orchestrator.retrieve(&columns, &mut surface).unwrap();

        assert_eq!(surface.initial[0].bounds, persisted);
        assert_eq!(surface.initial[1].bounds, Bounds::new(1.0, 3.0).unwrap());
        assert_eq!(orchestrator.engine.estimates.get(), 1);
    }

    #[test]
    fn identical_updates_give_identical_tables() {
        let dir = tempfile::tempdir().unwrap();
        let columns: ColumnMap = [column("1", None)].into_iter().collect();
        let bounds = Bounds::new(0.5, 2.0).unwrap();

        let mut surface = ScriptedSurface::new(move |_, session| {
            let first = session.fit("1", Some(bounds))?;
            let second = session.fit("1", Some(bounds))?;
            assert_eq!(first, second);
            let probes: Vec<&str> = first.comparison.iter().map(|r| r.probe.as_str()).collect();
            assert_eq!(probes, vec!["S1", "S2", "S3"]);
            session.commit()?;
            Ok(())
        });
        let results = orchestrator(StubEngine::default(), &dir)
            .retrieve(&columns, &mut surface)
            .unwrap()
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results["1"].bounds, bounds);
    }

    #[test]
    fn commit_writes_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let columns: ColumnMap = [column("1", None)].into_iter().collect();

        let mut surface = ScriptedSurface::new(|_, session| {
            session.commit()?;
            Ok(())
        });
        let orchestrator = orchestrator(StubEngine::default(), &dir);
        let results = orchestrator.retrieve(&columns, &mut surface).unwrap();

        assert!(results.is_some());
        let report = std::fs::read_to_string(orchestrator.report_path()).unwrap();
        assert!(report.contains(r#"<column id="1" nickname="line 1">"#));
        assert!(report.contains(r#"<bounds lb="1" ub="3"/>"#));
    }

    #[test]
    fn closing_without_commit_is_a_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let columns: ColumnMap = [column("1", None)].into_iter().collect();
        let mut surface = ScriptedSurface::new(|_, _| Ok(()));

        let orchestrator = orchestrator(StubEngine::default(), &dir);
        assert!(orchestrator.retrieve(&columns, &mut surface).unwrap().is_none());
        assert!(!orchestrator.report_path().exists());
    }

    #[test]
    fn fit_failures_surface_their_root_cause() {
        let dir = tempfile::tempdir().unwrap();
        let columns: ColumnMap = [column("9", None)].into_iter().collect();
        let engine = StubEngine {
            singular: true,
            ..StubEngine::default()
        };
        let mut surface = ScriptedSurface::new(|_, _| Ok(()));

        let err = orchestrator(engine, &dir).retrieve(&columns, &mut surface).unwrap_err();
        match err {
            CorrectionError::Fit { column_id, cause } => {
                assert_eq!(column_id, "9");
                assert_eq!(cause, RegressionError::Singular.to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(surface.runs, 0);
    }

    #[test]
    fn ignored_fit_failure_still_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let columns: ColumnMap = [column("1", None), column("2", None)].into_iter().collect();

        let mut surface = ScriptedSurface::new(|_, session| {
            let bad = Bounds::new(-1.0, 1.0).unwrap();
            assert!(session.fit("1", Some(bad)).is_err());
            assert!(matches!(
                session.fit("nope", None),
                Err(CorrectionError::UnknownColumn(id)) if id == "nope"
            ));
            assert!(matches!(
                session.commit(),
                Err(CorrectionError::State(StateError::Faulted))
            ));
            Ok(())
        });

        let orchestrator = orchestrator(StubEngine::default(), &dir);
        let err = orchestrator.retrieve(&columns, &mut surface).unwrap_err();
        assert!(matches!(err, CorrectionError::Fit { ref column_id, .. } if column_id == "1"));
        assert!(!orchestrator.report_path().exists());
    }

    #[test]
    fn columns_without_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let empty = ColumnDatum {
            table: CalibrationTable::default(),
            ..column("2", None)
        };
        let columns: ColumnMap = [column("1", None), empty].into_iter().collect();

        let mut surface = ScriptedSurface::new(|initial, session| {
            let ids: Vec<&str> = initial.iter().map(|f| f.column_id.as_str()).collect();
            assert_eq!(ids, vec!["1"]);
            session.commit()?;
            Ok(())
        });
        let orchestrator = orchestrator(StubEngine::default(), &dir);
        let results = orchestrator.retrieve(&columns, &mut surface).unwrap().unwrap();

        assert_eq!(results.len(), 1);
        let report = std::fs::read_to_string(orchestrator.report_path()).unwrap();
        assert!(report.contains(r#"<column id="1""#));
        assert!(!report.contains(r#"<column id="2""#));
    }

    #[test]
    fn only_empty_columns_do_not_start_the_surface() {
        let dir = tempfile::tempdir().unwrap();
        let empty = ColumnDatum {
            table: CalibrationTable::default(),
            ..column("1", None)
        };
        let columns: ColumnMap = [empty].into_iter().collect();
        let mut surface = ScriptedSurface::new(|_, _| Ok(()));

        let results = orchestrator(StubEngine::default(), &dir)
            .retrieve(&columns, &mut surface)
            .unwrap();

        assert!(results.unwrap().is_empty());
        assert_eq!(surface.runs, 0);
    }

    #[test]
    fn commit_before_any_fit_is_a_state_error() {
        let engine = StubEngine::default();
        let columns = ColumnMap::new();
        let mut session = Session {
            engine: &engine,
            reporter: &ReportBuilder,
            report_path: Path::new(REPORT_FILENAME),
            columns: &columns,
            results: FitResults::new(),
            fault: None,
            committed: false,
        };

        assert!(matches!(
            session.send(SurfaceRequest::Commit),
            Err(CorrectionError::State(StateError::NothingFitted))
        ));
        assert!(!session.committed);
    }
}
