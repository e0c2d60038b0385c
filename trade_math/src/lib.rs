//! # Trade Math
//!
//! Numeric primitives used by the forecasting pipeline:
//! - Descriptive statistics over price and volume series
//! - Ridge-regularised least squares
//! - Fourier basis terms for periodic components

use thiserror::Error;

pub mod fourier;
pub mod regression;
pub mod stats;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
