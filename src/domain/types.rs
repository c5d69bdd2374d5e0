//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built once by the decoder and read by every later stage
//! - grouped and reduced by small pure functions
//! - serialized into exports for offline inspection

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BoundsError;
use crate::math::nan_mean;

/// Intensity interval over which a correction model is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    lb: f64,
    ub: f64,
}

impl Bounds {
    pub fn new(lb: f64, ub: f64) -> Result<Self, BoundsError> {
        if !(lb.is_finite() && ub.is_finite()) {
            return Err(BoundsError::NonFinite { lb, ub });
        }
        if lb > ub {
            return Err(BoundsError::Inverted { lb, ub });
        }
        Ok(Self { lb, ub })
    }

    /// Build bounds from two endpoints given in any order (e.g. a drag selection).
    pub fn ordered(a: f64, b: f64) -> Result<Self, BoundsError> {
        Self::new(a.min(b), a.max(b))
    }

    pub fn lb(&self) -> f64 {
        self.lb
    }

    pub fn ub(&self) -> f64 {
        self.ub
    }

    pub fn contains(&self, intensity: f64) -> bool {
        self.lb <= intensity && intensity <= self.ub
    }
}

/// One calibration row: a single replicate run of a probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub probe: String,
    pub parallel: String,
    /// NaN when the concentration is unknown.
    pub concentration: f64,
    /// Peak of `raw_samples`.
    pub intensity: f64,
    /// Full decoded waveform; masked entries are NaN.
    pub raw_samples: Vec<f64>,
    pub is_blank: bool,
}

impl Sample {
    /// A row whose waveform is the single intensity value.
    pub fn point(probe: &str, parallel: &str, concentration: f64, intensity: f64) -> Self {
        Self {
            probe: probe.to_string(),
            parallel: parallel.to_string(),
            concentration,
            intensity,
            raw_samples: vec![intensity],
            is_blank: false,
        }
    }
}

/// Mean background removed from a column by blank subtraction.
#[derive(Debug, Clone, PartialEq)]
pub struct BlankProfile {
    pub intensity: f64,
    pub waveform: Vec<f64>,
}

/// Per-column calibration rows in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    rows: Vec<Sample>,
}

impl CalibrationTable {
    pub fn new(rows: Vec<Sample>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Sample] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn non_blank(&self) -> impl Iterator<Item = &Sample> {
        self.rows.iter().filter(|r| !r.is_blank)
    }

    /// Subtract the blank probe's mean intensity and mean waveform from every row.
    ///
    /// Blank rows are shifted too, so their mean intensity becomes zero.
    /// Returns `None` (and leaves the table untouched) when there is no blank row.
    pub fn subtract_blank(&mut self) -> Option<BlankProfile> {
        let blank: Vec<&Sample> = self.rows.iter().filter(|r| r.is_blank).collect();
        if blank.is_empty() {
            return None;
        }

        let intensity = nan_mean(blank.iter().map(|r| r.intensity));
        let len = blank.iter().map(|r| r.raw_samples.len()).max().unwrap_or(0);
        let waveform: Vec<f64> = (0..len)
            .map(|i| nan_mean(blank.iter().filter_map(|r| r.raw_samples.get(i).copied())))
            .collect();

        for row in &mut self.rows {
            if intensity.is_finite() {
                row.intensity -= intensity;
            }
            for (value, background) in row.raw_samples.iter_mut().zip(&waveform) {
                if background.is_finite() {
                    *value -= background;
                }
            }
        }

        Some(BlankProfile { intensity, waveform })
    }
}

/// Group mean for one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeMean {
    pub probe: String,
    pub concentration: f64,
    pub intensity: f64,
    pub n: usize,
}

/// Group rows by probe, in first-appearance order, averaging concentration
/// and intensity (NaN-skipping).
pub fn group_by_probe_mean<'a>(rows: impl IntoIterator<Item = &'a Sample>) -> Vec<ProbeMean> {
    let mut groups: Vec<(String, Vec<&Sample>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(probe, _)| *probe == row.probe) {
            Some((_, members)) => members.push(row),
            None => groups.push((row.probe.clone(), vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(probe, members)| ProbeMean {
            concentration: nan_mean(members.iter().map(|r| r.concentration)),
            intensity: nan_mean(members.iter().map(|r| r.intensity)),
            n: members.len(),
            probe,
        })
        .collect()
}

/// A point of a calibration curve (`x` recorded, `y` corrected intensity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Everything known about one emission-line column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDatum {
    pub column_id: String,
    /// Display label, e.g. element + wavelength.
    pub nickname: String,
    pub table: CalibrationTable,
    /// Fit domain persisted by a previous run.
    pub bounds: Option<Bounds>,
    /// Calibration curve persisted by a previous run.
    pub prior_curve: Option<Vec<CurvePoint>>,
}

/// Columns keyed by id, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    columns: Vec<ColumnDatum>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column; a replacement keeps its original position.
    pub fn insert(&mut self, datum: ColumnDatum) {
        match self.columns.iter_mut().find(|c| c.column_id == datum.column_id) {
            Some(slot) => *slot = datum,
            None => self.columns.push(datum),
        }
    }

    pub fn get(&self, column_id: &str) -> Option<&ColumnDatum> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDatum> {
        self.columns.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.column_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnDatum> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = ColumnDatum>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for datum in iter {
            map.insert(datum);
        }
        map
    }
}

/// Opaque pass-through metadata from the `titul` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub organization: Option<String>,
    pub device: Option<String>,
    pub user: Option<String>,
    pub analysis: Option<String>,
}

/// The aggregate produced by one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    pub filepath: PathBuf,
    pub meta: Metadata,
    pub columns: ColumnMap,
}

/// Recorded vs. model-predicted intensity for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub probe: String,
    pub parallel: String,
    pub concentration: f64,
    pub intensity: f64,
    /// Intensity the linear model expects at this concentration.
    pub intensity_true: f64,
    /// Recorded intensity after correction.
    pub intensity_linearized: f64,
}
