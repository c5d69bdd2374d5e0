//! Report documents consumed by the host application.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::REPORT_FILENAME;
use crate::correction::FitResults;
use crate::domain::{CalibrationTable, ColumnMap, CurvePoint, group_by_probe_mean};
use crate::error::ReportError;
use crate::fit::Transformer;
use crate::report::xml::{XmlWriter, fmt_number};

pub const FAILURE_MESSAGES: [&str; 2] = [
    "Absorption correction failed!",
    "Open `${ATOM_PATH}/Data/.log` to more information.",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    /// Render fitted bounds and the corrected calibration curve per column.
    ///
    /// Columns without a fit result are left out of the report.
    pub fn build(&self, columns: &ColumnMap, results: &FitResults) -> String {
        let mut xml = XmlWriter::new();
        xml.open("columns", &[]);

        for column in columns.iter() {
            let Some(result) = results.get(&column.column_id) else {
                warn!(column_id = %column.column_id, "column was never fitted; left out of the report");
                continue;
            };

            xml.open(
                "column",
                &[("id", column.column_id.as_str()), ("nickname", column.nickname.as_str())],
            );
            let (lb, ub) = (fmt_number(result.bounds.lb()), fmt_number(result.bounds.ub()));
            xml.empty("bounds", &[("lb", lb.as_str()), ("ub", ub.as_str())]);

            let points = calibration_points(&column.table, result.transformer.as_ref());
            if points.is_empty() {
                xml.empty("polynom", &[]);
            } else {
                xml.open("polynom", &[]);
                for point in points {
                    let (x, y) = (fmt_number(point.x), fmt_number(point.y));
                    xml.empty("point", &[("x", x.as_str()), ("y", y.as_str())]);
                }
                xml.close();
            }
            xml.close();
        }

        xml.finish()
    }

    /// Write `document` to `results.xml` in the working directory.
    pub fn dump(&self, document: &str) -> Result<PathBuf, ReportError> {
        self.dump_to(document, Path::new(REPORT_FILENAME))
    }

    pub fn dump_to(&self, document: &str, path: &Path) -> Result<PathBuf, ReportError> {
        std::fs::write(path, document).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "report written");
        Ok(path.to_path_buf())
    }

    /// Document shown to the host when the pipeline cannot complete.
    pub fn failure_document(&self) -> String {
        let mut xml = XmlWriter::new();
        xml.open("columns", &[]);
        for text in FAILURE_MESSAGES {
            xml.empty("message", &[("text", text)]);
        }
        xml.finish()
    }
}

/// One point per probe: mean recorded intensity and its corrected value.
///
/// Blank rows and rows with unknown concentration are excluded.
pub fn calibration_points(table: &CalibrationTable, transformer: &dyn Transformer) -> Vec<CurvePoint> {
    let rows = table.non_blank().filter(|r| !r.concentration.is_nan());
    group_by_probe_mean(rows)
        .into_iter()
        .map(|group| CurvePoint {
            x: group.intensity,
            y: transformer.apply(group.intensity),
        })
        .collect()
}
