use absorption_correction::app::pipeline::{PipelineOutcome, run_pipeline_in};
use absorption_correction::config::PluginConfig;
use absorption_correction::correction::{FitComputed, HeadlessSurface, InteractiveSurface, SessionHandle};
use absorption_correction::data::synthetic::{self, LINE_COLUMN_ID, LINE_NICKNAME, SynthConfig};
use absorption_correction::domain::ColumnMap;
use absorption_correction::error::CorrectionError;
use absorption_correction::io::filepath::wrapper_for;

fn config() -> PluginConfig {
    PluginConfig {
        blank_name: Some("Blank".to_string()),
        ..PluginConfig::default()
    }
}

fn write_dataset(dir: &std::path::Path, synth: &SynthConfig) -> String {
    let path = dir.join("py_table.xml");
    std::fs::write(&path, synthetic::generate(synth).unwrap()).unwrap();
    wrapper_for(&path)
}

fn attr(node: roxmltree::Node<'_, '_>, name: &str) -> f64 {
    node.attribute(name).unwrap().parse().unwrap()
}

#[test]
fn headless_run_writes_and_returns_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let synth = SynthConfig::default();
    let wrapper = write_dataset(dir.path(), &synth);
    let report_path = dir.path().join("results.xml");

    let outcome = run_pipeline_in(&config(), &wrapper, &mut HeadlessSurface, &report_path).unwrap();
    let PipelineOutcome::Completed(run) = outcome else {
        panic!("headless run was cancelled");
    };

    assert_eq!(run.report_path, report_path);
    assert_eq!(std::fs::read_to_string(&report_path).unwrap(), run.document);
    assert_eq!(run.snapshot.meta.organization.as_deref(), Some("Synthetic Lab"));
    assert!(run.document.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));

    let doc = roxmltree::Document::parse(&run.document).unwrap();
    let root = doc.root_element();
    assert!(root.has_tag_name("columns"));

    let columns: Vec<_> = root.children().filter(|n| n.has_tag_name("column")).collect();
    assert_eq!(columns.len(), 1);
    let column = columns[0];
    assert_eq!(column.attribute("id"), Some(LINE_COLUMN_ID));
    assert_eq!(column.attribute("nickname"), Some(LINE_NICKNAME));

    let bounds = column.children().find(|n| n.has_tag_name("bounds")).unwrap();
    let (lb, ub) = (attr(bounds, "lb"), attr(bounds, "ub"));
    assert!(lb.is_finite() && ub.is_finite() && 0.0 < lb && lb < ub);

    let points: Vec<(f64, f64)> = column
        .children()
        .find(|n| n.has_tag_name("polynom"))
        .unwrap()
        .children()
        .filter(|n| n.has_tag_name("point"))
        .map(|p| (attr(p, "x"), attr(p, "y")))
        .collect();
    assert_eq!(points.len(), synth.probes);

    // Low concentrations are left almost untouched; the saturated end is lifted.
    let (x_first, y_first) = points[0];
    assert!((y_first / x_first - 1.0).abs() < 0.2, "{points:?}");
    let (x_last, y_last) = points[points.len() - 1];
    assert!(y_last > 2.0 * x_last, "{points:?}");
}

/// Looks at the fits and closes without saving.
struct CloseWithoutSaving {
    seen: usize,
}

impl InteractiveSurface for CloseWithoutSaving {
    fn run(
        &mut self,
        _columns: &ColumnMap,
        initial: Vec<FitComputed>,
        _session: &mut dyn SessionHandle,
    ) -> Result<(), CorrectionError> {
        self.seen = initial.len();
        Ok(())
    }
}

#[test]
fn closing_without_saving_cancels_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let wrapper = write_dataset(dir.path(), &SynthConfig::default());
    let report_path = dir.path().join("results.xml");

    let mut surface = CloseWithoutSaving { seen: 0 };
    let outcome = run_pipeline_in(&config(), &wrapper, &mut surface, &report_path).unwrap();

    assert!(matches!(outcome, PipelineOutcome::Cancelled));
    assert_eq!(surface.seen, 1);
    assert!(!report_path.exists());
}

#[test]
fn missing_data_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let wrapper = wrapper_for(&dir.path().join("absent.xml"));
    let report_path = dir.path().join("results.xml");

    let err = run_pipeline_in(&config(), &wrapper, &mut HeadlessSurface, &report_path).unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("file not found"), "{err}");
    assert!(!report_path.exists());
}
