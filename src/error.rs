//! Error types.
//!
//! `AppError` is the process-level error: a message plus the exit code the
//! binary reports. Everything below it is the typed taxonomy the pipeline
//! stages return, so callers can tell bad input (`IngestError`) from a bad fit
//! (`CorrectionError`) from a broken session (`StateError`).

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::new(2, error_chain(&err))
    }
}

impl From<CorrectionError> for AppError {
    fn from(err: CorrectionError) -> Self {
        AppError::new(3, error_chain(&err))
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::new(4, error_chain(&err))
    }
}

/// Follow `source()` links down to the earliest error in the chain.
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

/// Render an error and all of its sources as `outer: inner: root`.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut out = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        out.push_str(": ");
        out.push_str(&source.to_string());
        current = source.source();
    }
    out
}

/// Top-level ingestion failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to resolve the data file path")]
    Resolve(#[from] ResolveError),
    #[error("failed to load the data file")]
    Load(#[from] LoadError),
    #[error("failed to parse calibration tables")]
    Table(#[from] TableParseError),
    #[error("failed to parse metadata")]
    Meta(#[from] MetaParseError),
}

/// The host wrapper document did not yield a path.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("wrapper document is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    #[error("wrapper root element is <{0}>, expected <input>")]
    UnexpectedRoot(String),
    #[error("wrapper <input> element carries no path")]
    EmptyPath,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not well-formed XML", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// Structural or binary-decode failure while building calibration tables.
#[derive(Debug, Error)]
pub enum TableParseError {
    #[error("missing <{0}> section")]
    MissingSection(&'static str),
    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        column_id: Option<String>,
    },
    #[error("column {column_id}: failed to decode the graph of probe {probe}")]
    Decode {
        column_id: String,
        probe: String,
        #[source]
        source: DecodeError,
    },
    #[error("column {column_id}: no concentration for probe {probe_id}")]
    MissingConcentration { column_id: String, probe_id: String },
    #[error("column {column_id}: invalid persisted {field} value {value:?}")]
    InvalidPersisted {
        column_id: String,
        field: &'static str,
        value: String,
    },
    #[error("column {column_id}: persisted bounds are invalid")]
    InvalidBounds {
        column_id: String,
        #[source]
        source: BoundsError,
    },
}

impl TableParseError {
    /// The column the failure belongs to, when known.
    pub fn column_id(&self) -> Option<&str> {
        match self {
            Self::MissingSection(_) => None,
            Self::MissingAttribute { column_id, .. } => column_id.as_deref(),
            Self::Decode { column_id, .. }
            | Self::MissingConcentration { column_id, .. }
            | Self::InvalidPersisted { column_id, .. }
            | Self::InvalidBounds { column_id, .. } => Some(column_id),
        }
    }
}

/// Binary payload decode failure for a single graph record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing <{0}> element")]
    MissingElement(&'static str),
    #[error("invalid base64 payload")]
    Base64(#[from] base64::DecodeError),
    #[error("payload of {len} bytes is not a whole number of {width}-byte values")]
    Misaligned { len: usize, width: usize },
    #[error("declared array size {declared} does not match decoded length {decoded}")]
    SizeMismatch { declared: usize, decoded: usize },
    #[error("invalid declared array size {0:?}")]
    InvalidSize(String),
    #[error("mask index {index} outside [0, {size})")]
    MaskOutOfRange { index: i32, size: usize },
}

#[derive(Debug, Error)]
pub enum MetaParseError {
    #[error("metadata section <titul> appears {0} times")]
    Duplicated(usize),
    #[error("metadata field <{0}> must contain text only")]
    NotText(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoundsError {
    #[error("bounds must be finite, got [{lb}, {ub}]")]
    NonFinite { lb: f64, ub: f64 },
    #[error("lower bound {lb} exceeds upper bound {ub}")]
    Inverted { lb: f64, ub: f64 },
}

/// Failure inside a fit engine.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("no calibration points with finite concentration and intensity")]
    NoData,
    #[error("bounds [{lb}, {ub}] contain no calibration points")]
    EmptyDomain { lb: f64, ub: f64 },
    #[error("at least {required} calibration points are needed, got {got}")]
    TooFewPoints { required: usize, got: usize },
    #[error("correction regression failed")]
    Regression(#[from] RegressionError),
    #[error("invalid bounds")]
    Bounds(#[from] BoundsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegressionError {
    #[error("least-squares system is singular or ill-conditioned")]
    Singular,
    #[error("regression produced non-finite coefficients")]
    NonFinite,
}

/// Failure while retrieving transformers.
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// `cause` is the root cause of the fit failure, not an intermediate wrapper.
    #[error("column {column_id}: {cause}")]
    Fit { column_id: String, cause: String },
    #[error("unknown column {0}")]
    UnknownColumn(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to write the report")]
    Report(#[from] ReportError),
    #[error("interactive surface failed: {0}")]
    Surface(String),
}

impl CorrectionError {
    pub fn fit(column_id: &str, error: &(dyn StdError + 'static)) -> Self {
        CorrectionError::Fit {
            column_id: column_id.to_string(),
            cause: root_cause(error).to_string(),
        }
    }
}

/// Internal precondition violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("finalize requested before any column was fitted")]
    NothingFitted,
    #[error("finalize refused: a fit failed earlier in this session")]
    Faulted,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
