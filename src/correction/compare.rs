//! Recorded vs. predicted intensity per calibration row.

use crate::domain::{CalibrationTable, ComparisonRow};
use crate::fit::Transformer;

/// Non-blank rows, stably sorted by ascending concentration (NaN last).
pub fn comparison_table(table: &CalibrationTable, transformer: &dyn Transformer) -> Vec<ComparisonRow> {
    let mut rows: Vec<ComparisonRow> = table
        .non_blank()
        .map(|r| ComparisonRow {
            probe: r.probe.clone(),
            parallel: r.parallel.clone(),
            concentration: r.concentration,
            intensity: r.intensity,
            intensity_true: transformer.estimate_intensity(r.concentration),
            intensity_linearized: transformer.apply(r.intensity),
        })
        .collect();

    rows.sort_by(|a, b| match (a.concentration.is_nan(), b.concentration.is_nan()) {
        (false, false) => a.concentration.total_cmp(&b.concentration),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    rows
}
