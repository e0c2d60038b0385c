//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(format!(
            "Actual and predicted values must have the same non-zero length, got {} and {}",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean absolute percentage error, in percent.
///
/// A zero actual makes the ratio undefined and is reported as a computation
/// error rather than an infinite score.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    if let Some(position) = actual.iter().position(|a| *a == 0.0) {
        return Err(ForecastError::ComputationError(format!(
            "MAPE is undefined: actual value at position {} is zero",
            position
        )));
    }

    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();
    Ok(total / actual.len() as f64 * 100.0)
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    Ok(mse.sqrt())
}

/// Coefficient of determination.
///
/// When the actuals are constant the score is 1.0 for a perfect fit and 0.0
/// otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Qualitative grade of a MAPE value
pub fn mape_label(mape: f64) -> &'static str {
    if mape < 5.0 {
        "ótimo"
    } else if mape < 10.0 {
        "bom"
    } else {
        "ruim"
    }
}

/// Qualitative grade of an R² value
pub fn r2_label(r2: f64) -> &'static str {
    if r2 > 0.5 {
        "ótimo"
    } else if r2 > 0.0 {
        "aceitável"
    } else {
        "ruim"
    }
}

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Accuracy of a forecast against held-out actuals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    /// Root mean squared error, in price units
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl ForecastMetrics {
    /// Score `predicted` against `actual`
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            mape: mape(actual, predicted)?,
            rmse: rmse(actual, predicted)?,
            r2: r2_score(actual, predicted)?,
        })
    }
}

impl std::fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Metrics:")?;
        writeln!(f, "  MAPE: {:.2}% ({})", self.mape, mape_label(self.mape))?;
        writeln!(f, "  RMSE: {:.4}", self.rmse)?;
        write!(f, "  R²: {:.4} ({})", self.r2, r2_label(self.r2))
    }
}
