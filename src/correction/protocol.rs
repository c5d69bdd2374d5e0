//! Messages between the orchestrator and an interactive surface.
//!
//! The surface owns the event loop. It receives the initial fits, then drives
//! the session through a `SessionHandle`:
//!
//! - `Fit` refits one column (explicit bounds, or persisted/estimated ones)
//! - `Commit` writes the report; the session stays open
//!
//! Returning from `InteractiveSurface::run` ends the session. Returning without
//! a successful commit is a cancellation.

use std::path::PathBuf;

use serde::Serialize;

use crate::domain::{Bounds, ColumnMap, ComparisonRow};
use crate::error::CorrectionError;

/// Outcome of one fit request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitComputed {
    pub column_id: String,
    /// Bounds the transformer was actually fitted with.
    pub bounds: Bounds,
    pub comparison: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRequest {
    /// `bounds: None` uses the persisted bounds, or estimates them.
    Fit {
        column_id: String,
        bounds: Option<Bounds>,
    },
    /// Drop any explicit choice and refit with estimated bounds.
    Estimate { column_id: String },
    Commit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceReply {
    FitComputed(FitComputed),
    Committed { report_path: PathBuf },
}

/// Callback into the running correction session.
pub trait SessionHandle {
    fn send(&mut self, request: SurfaceRequest) -> Result<SurfaceReply, CorrectionError>;

    fn fit(&mut self, column_id: &str, bounds: Option<Bounds>) -> Result<FitComputed, CorrectionError> {
        match self.send(SurfaceRequest::Fit {
            column_id: column_id.to_string(),
            bounds,
        })? {
            SurfaceReply::FitComputed(computed) => Ok(computed),
            SurfaceReply::Committed { .. } => Err(CorrectionError::Surface(
                "session answered a fit request with a commit".to_string(),
            )),
        }
    }

    fn estimate(&mut self, column_id: &str) -> Result<FitComputed, CorrectionError> {
        match self.send(SurfaceRequest::Estimate {
            column_id: column_id.to_string(),
        })? {
            SurfaceReply::FitComputed(computed) => Ok(computed),
            SurfaceReply::Committed { .. } => Err(CorrectionError::Surface(
                "session answered an estimate request with a commit".to_string(),
            )),
        }
    }

    fn commit(&mut self) -> Result<PathBuf, CorrectionError> {
        match self.send(SurfaceRequest::Commit)? {
            SurfaceReply::Committed { report_path } => Ok(report_path),
            SurfaceReply::FitComputed(_) => Err(CorrectionError::Surface(
                "session answered a commit with a fit".to_string(),
            )),
        }
    }
}

/// Presentation layer driving bounds selection.
pub trait InteractiveSurface {
    /// Run until the user is done. `initial` holds one fit per column, in
    /// column order.
    fn run(
        &mut self,
        columns: &ColumnMap,
        initial: Vec<FitComputed>,
        session: &mut dyn SessionHandle,
    ) -> Result<(), CorrectionError>;
}
