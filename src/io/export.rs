//! Export per-column fit results to JSON.
//!
//! Meant for offline inspection of a session: bounds, the reported calibration
//! points and the full recorded vs. predicted comparison table.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::correction::{FitResults, comparison_table};
use crate::domain::{Bounds, ColumnMap, ComparisonRow, CurvePoint};
use crate::error::AppError;
use crate::report::calibration_points;

#[derive(Debug, Serialize)]
pub struct ColumnExport<'a> {
    pub column_id: &'a str,
    pub nickname: &'a str,
    pub bounds: Bounds,
    pub calibration: Vec<CurvePoint>,
    pub comparison: Vec<ComparisonRow>,
}

/// Fitted columns in column order; unfitted columns are skipped.
pub fn collect_exports<'a>(columns: &'a ColumnMap, results: &FitResults) -> Vec<ColumnExport<'a>> {
    columns
        .iter()
        .filter_map(|column| {
            let result = results.get(&column.column_id)?;
            let transformer = result.transformer.as_ref();
            Some(ColumnExport {
                column_id: &column.column_id,
                nickname: &column.nickname,
                bounds: result.bounds,
                calibration: calibration_points(&column.table, transformer),
                comparison: comparison_table(&column.table, transformer),
            })
        })
        .collect()
}

pub fn write_results_json(path: &Path, columns: &ColumnMap, results: &FitResults) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(BufWriter::new(file), &collect_exports(columns, results))
        .map_err(|e| AppError::new(4, format!("Failed to write export JSON: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::FitResult;
    use crate::domain::{CalibrationTable, ColumnDatum, Sample};
    use crate::fit::Transformer;

    #[derive(Debug)]
    struct Identity(Bounds);

    impl Transformer for Identity {
        fn bounds(&self) -> Bounds {
            self.0
        }

        fn apply(&self, intensity: f64) -> f64 {
            intensity
        }

        fn estimate_intensity(&self, concentration: f64) -> f64 {
            concentration
        }
    }

    #[test]
    fn export_contains_fitted_columns_only() {
        let column = |id: &str| ColumnDatum {
            column_id: id.to_string(),
            nickname: format!("line {id}"),
            table: CalibrationTable::new(vec![Sample::point("S1", "1", 1.0, 2.0)]),
            bounds: None,
            prior_curve: None,
        };
        let columns: ColumnMap = [column("a"), column("b")].into_iter().collect();
        let bounds = Bounds::new(1.0, 2.0).unwrap();
        let results = FitResults::from([(
            "b".to_string(),
            FitResult {
                transformer: Box::new(Identity(bounds)),
                bounds,
            },
        )]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results_json(&path, &columns, &results).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["column_id"], "b");
        assert_eq!(items[0]["bounds"]["ub"], 2.0);
        assert_eq!(items[0]["calibration"][0]["y"], 2.0);
        assert_eq!(items[0]["comparison"][0]["intensity_true"], 1.0);
    }
}
