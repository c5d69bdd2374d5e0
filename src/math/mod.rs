//! Mathematical utilities: NaN-aware reductions and polynomial least squares.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
