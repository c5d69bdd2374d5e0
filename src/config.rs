//! Plugin configuration.
//!
//! Everything the pipeline needs from the environment is read once into a
//! `PluginConfig` and then passed down explicitly: the blank marker goes to the
//! table decoder, the engine settings go to the regression engine, and the
//! logging fields go to `logging::init`.

use std::path::PathBuf;

use crate::error::AppError;
use crate::io::DecodeOptions;

/// Fixed name of the report written into the working directory.
pub const REPORT_FILENAME: &str = "results.xml";

const DEFAULT_LOG_FILE: &str = ".log";
const DEFAULT_DEGREE: usize = 2;
const MAX_DEGREE: usize = 3;
const DEFAULT_LINEARITY_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// Settings for the default regression engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Degree of the log-log correction polynomial.
    pub degree: usize,
    /// Relative sensitivity drift tolerated inside the estimated bounds.
    pub linearity_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
            linearity_tolerance: DEFAULT_LINEARITY_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    /// Probe name marking the blank; `None` disables blank subtraction.
    pub blank_name: Option<String>,
    pub logging_level: LogLevel,
    pub log_file: PathBuf,
    pub engine: EngineConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            blank_name: None,
            logging_level: LogLevel::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            engine: EngineConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // BLACK_NAME is the older spelling still found in deployed `.env` files.
        let blank_name = get("BLANK_NAME").or_else(|| get("BLACK_NAME"));

        let logging_level = match get("LOGGING_LEVEL") {
            Some(raw) => LogLevel::parse(&raw).ok_or_else(|| {
                AppError::new(
                    2,
                    format!("Invalid LOGGING_LEVEL '{raw}'. Expected DEBUG, INFO, WARNING or ERROR."),
                )
            })?,
            None => LogLevel::default(),
        };

        let log_file = get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        let degree = match get("CORRECTION_DEGREE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|d| (1..=MAX_DEGREE).contains(d))
                .ok_or_else(|| {
                    AppError::new(
                        2,
                        format!("Invalid CORRECTION_DEGREE '{raw}'. Expected an integer in 1..={MAX_DEGREE}."),
                    )
                })?,
            None => DEFAULT_DEGREE,
        };

        let linearity_tolerance = match get("LINEARITY_TOLERANCE") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite() && *t > 0.0)
                .ok_or_else(|| {
                    AppError::new(
                        2,
                        format!("Invalid LINEARITY_TOLERANCE '{raw}'. Expected a positive number."),
                    )
                })?,
            None => DEFAULT_LINEARITY_TOLERANCE,
        };

        Ok(Self {
            blank_name,
            logging_level,
            log_file,
            engine: EngineConfig {
                degree,
                linearity_tolerance,
            },
        })
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            blank_name: self.blank_name.clone(),
        }
    }
}
