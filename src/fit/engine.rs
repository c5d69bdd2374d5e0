//! Fit-engine seam.
//!
//! The orchestrator only talks to these two traits. `FitEngine` turns a
//! calibration table into a fitted `Transformer`; the transformer maps a
//! recorded intensity onto the linear (unabsorbed) scale.

use std::fmt::Debug;

use crate::domain::{Bounds, CalibrationTable};
use crate::error::FitError;

/// One regression input point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPoint {
    pub concentration: f64,
    pub intensity: f64,
}

/// Engine-ready view of a calibration table.
#[derive(Debug, Clone, PartialEq)]
pub struct FitInput {
    pub points: Vec<FitPoint>,
}

/// A fitted correction model for one column.
pub trait Transformer: Debug {
    /// Domain the model was fitted over.
    fn bounds(&self) -> Bounds;

    /// Corrected (linearized) value of a recorded intensity.
    fn apply(&self, intensity: f64) -> f64;

    /// Intensity the linear model expects at `concentration`.
    fn estimate_intensity(&self, concentration: f64) -> f64;
}

pub trait FitEngine {
    /// Regression input: non-blank rows with finite concentration and intensity.
    fn prepare(&self, table: &CalibrationTable) -> Result<FitInput, FitError> {
        let points: Vec<FitPoint> = table
            .non_blank()
            .filter(|r| r.concentration.is_finite() && r.intensity.is_finite())
            .map(|r| FitPoint {
                concentration: r.concentration,
                intensity: r.intensity,
            })
            .collect();

        if points.is_empty() {
            return Err(FitError::NoData);
        }
        Ok(FitInput { points })
    }

    /// Automatic fit domain for a column without explicit or persisted bounds.
    fn estimate_bounds(&self, input: &FitInput) -> Result<Bounds, FitError>;

    fn fit(&self, input: &FitInput, bounds: Bounds) -> Result<Box<dyn Transformer>, FitError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sample;

    struct Noop;

    impl FitEngine for Noop {
        fn estimate_bounds(&self, _input: &FitInput) -> Result<Bounds, FitError> {
            Err(FitError::NoData)
        }

        fn fit(&self, _input: &FitInput, _bounds: Bounds) -> Result<Box<dyn Transformer>, FitError> {
            Err(FitError::NoData)
        }
    }

    #[test]
    fn prepare_drops_blank_and_non_finite_rows() {
        let mut blank = Sample::point("Blank", "1", 0.0, 0.0);
        blank.is_blank = true;
        let table = CalibrationTable::new(vec![
            blank,
            Sample::point("S1", "1", 1.0, 10.0),
            Sample::point("S2", "1", f64::NAN, 20.0),
            Sample::point("S3", "1", 3.0, f64::NAN),
        ]);

        let input = Noop.prepare(&table).unwrap();
        assert_eq!(
            input.points,
            vec![FitPoint {
                concentration: 1.0,
                intensity: 10.0
            }]
        );
    }

    #[test]
    fn prepare_without_usable_rows_is_no_data() {
        let table = CalibrationTable::new(vec![Sample::point("S1", "1", f64::NAN, 1.0)]);
        assert!(matches!(Noop.prepare(&table), Err(FitError::NoData)));
    }
}
