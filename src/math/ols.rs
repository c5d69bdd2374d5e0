//! Polynomial least squares.
//!
//! The correction curve is a low-degree polynomial, so each fit is a tiny
//! Vandermonde system:
//!
//! ```text
//! minimize Σ (y_i - Σ_k β_k x_i^k)^2
//! ```
//!
//! Solved via SVD; Nalgebra's `QR::solve` only handles square systems and the
//! design matrix here is tall.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y ≈ β0 + β1 x + … + βd x^d`, coefficients in ascending power.
///
/// Returns `None` when `xs` and `ys` differ in length, there are fewer points
/// than coefficients, or the system cannot be solved.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = xs.len();
    let p = degree + 1;
    if n != ys.len() || n < p {
        return None;
    }

    let design = DMatrix::from_fn(n, p, |i, k| xs[i].powi(k as i32));
    let target = DVector::from_column_slice(ys);

    solve_least_squares(&design, &target).map(|beta| beta.iter().copied().collect())
}

/// Evaluate a polynomial with ascending-power coefficients (Horner).
pub fn eval_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}
