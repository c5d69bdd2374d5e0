//! Correction fitting.
//!
//! Responsibilities:
//!
//! - define the engine seam (`FitEngine`, `Transformer`)
//! - estimate the linear intensity range of a column
//! - fit the default log-log correction curve

pub mod bounds;
pub mod engine;
pub mod regression;

pub use bounds::*;
pub use engine::*;
pub use regression::*;
