//! Default regression engine.
//!
//! Model, for one column:
//!
//! ```text
//! linear response:   I_true(c) = k · c
//! correction curve:  ln I_true = P(ln I_recorded),  deg P = degree
//! ```
//!
//! `k` is fitted through the origin on the points whose recorded intensity lies
//! inside the bounds (where absorption is negligible). `P` is then solved by SVD
//! least squares over every positive point, so it bends recorded intensities
//! above the linear range back onto `k · c`.

use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::Bounds;
use crate::error::{FitError, RegressionError};
use crate::fit::bounds::estimate_linear_bounds;
use crate::fit::engine::{FitEngine, FitInput, FitPoint, Transformer};
use crate::math::{eval_polynomial, fit_polynomial};

#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionEngine {
    config: EngineConfig,
}

impl RegressionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTransformer {
    bounds: Bounds,
    sensitivity: f64,
    /// Ascending powers of `ln I`.
    coefficients: Vec<f64>,
}

impl RegressionTransformer {
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Transformer for RegressionTransformer {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn apply(&self, intensity: f64) -> f64 {
        if intensity > 0.0 {
            eval_polynomial(&self.coefficients, intensity.ln()).exp()
        } else {
            intensity
        }
    }

    fn estimate_intensity(&self, concentration: f64) -> f64 {
        self.sensitivity * concentration
    }
}

fn positive(points: &[FitPoint]) -> impl Iterator<Item = &FitPoint> {
    points
        .iter()
        .filter(|p| p.concentration > 0.0 && p.intensity > 0.0)
}

impl FitEngine for RegressionEngine {
    fn estimate_bounds(&self, input: &FitInput) -> Result<Bounds, FitError> {
        estimate_linear_bounds(&input.points, self.config.linearity_tolerance)
    }

    fn fit(&self, input: &FitInput, bounds: Bounds) -> Result<Box<dyn Transformer>, FitError> {
        let inside: Vec<f64> = positive(&input.points)
            .filter(|p| bounds.contains(p.intensity))
            .map(|p| p.intensity.ln() - p.concentration.ln())
            .collect();
        if inside.is_empty() {
            return Err(FitError::EmptyDomain {
                lb: bounds.lb(),
                ub: bounds.ub(),
            });
        }
        let sensitivity = (inside.iter().sum::<f64>() / inside.len() as f64).exp();

        let (xs, ys): (Vec<f64>, Vec<f64>) = positive(&input.points)
            .map(|p| (p.intensity.ln(), (sensitivity * p.concentration).ln()))
            .unzip();

        let mut distinct = xs.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(FitError::TooFewPoints {
                required: 2,
                got: distinct.len(),
            });
        }

        let degree = self.config.degree.min(distinct.len() - 1);
        let coefficients = fit_polynomial(&xs, &ys, degree).ok_or(RegressionError::Singular)?;
        if !coefficients.iter().all(|c| c.is_finite()) {
            return Err(RegressionError::NonFinite.into());
        }

        debug!(
            sensitivity,
            degree,
            points = xs.len(),
            lb = bounds.lb(),
            ub = bounds.ub(),
            "fitted correction curve"
        );

        Ok(Box::new(RegressionTransformer {
            bounds,
            sensitivity,
            coefficients,
        }))
    }
}
