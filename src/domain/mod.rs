//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calibration rows and tables (`Sample`, `CalibrationTable`)
//! - per-column data and the ingestion aggregate (`ColumnDatum`, `DatasetSnapshot`)
//! - fit domains and comparison rows (`Bounds`, `ComparisonRow`)

pub mod types;

pub use types::*;
