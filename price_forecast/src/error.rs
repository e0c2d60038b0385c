//! Error types for the price_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;
use trade_math::MathError;

/// Custom error types for the price_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed history data (bad columns, unordered dates, nulls)
    #[error("Data error: {0}")]
    DataError(String),

    /// A required file (history, model artifact, calendar) is missing or unreadable
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough rows for the requested split or fit
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Numeric failure such as a zero actual in MAPE or a singular solve
    #[error("Computation error: {0}")]
    ComputationError(String),

    /// Model artifact deserialized without its fitted history
    #[error("Degraded model artifact: {0}")]
    DegradedModel(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from encoding or decoding artifacts
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Closed classification of failures, used at process and HTTP boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or corrupt history, model or calendar
    DataUnavailable,
    /// Caller supplied an out-of-range or malformed argument
    Validation,
    /// Arithmetic failure or not enough data for the configured windows
    Computation,
}

impl ErrorKind {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::Validation => "validation",
            ErrorKind::Computation => "computation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ForecastError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::ValidationError(_) | ForecastError::InvalidParameter(_) => {
                ErrorKind::Validation
            }
            ForecastError::InsufficientData(_) | ForecastError::ComputationError(_) => {
                ErrorKind::Computation
            }
            ForecastError::DataError(_)
            | ForecastError::DataUnavailable(_)
            | ForecastError::DegradedModel(_)
            | ForecastError::IoError(_)
            | ForecastError::CsvError(_)
            | ForecastError::PolarsError(_)
            | ForecastError::SerializationError(_) => ErrorKind::DataUnavailable,
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientData(msg) => ForecastError::InsufficientData(msg),
            MathError::InvalidInput(msg) => ForecastError::InvalidParameter(msg),
            MathError::CalculationError(msg) => ForecastError::ComputationError(msg),
        }
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
