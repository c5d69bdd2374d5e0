//! `absorption-correction` library crate.
//!
//! The binary (`abscor`) is a thin wrapper around this library so that:
//!
//! - the decode, fit and report stages are testable without spawning processes
//! - surfaces other than the terminal UI can drive the same session
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod correction;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod report;
pub mod tui;
