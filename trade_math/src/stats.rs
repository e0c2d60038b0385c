//! Descriptive statistics over price and volume series
//!
//! Contains:
//! - Linear-interpolated quantiles
//! - Period-over-period percentage change
//! - Trailing (rolling) simple mean
//! - Mean and sample standard deviation

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Quantile of `values` using linear interpolation between closest ranks.
///
/// `q` must lie in `[0, 1]`. The position of the quantile is `q * (n - 1)`
/// over the sorted values, so `q = 0.5` on an even-sized sample returns the
/// midpoint of the two central values.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute a quantile of an empty series".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be between 0 and 1, got {}",
            q
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Series contains NaN values".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Percentage change between consecutive values.
///
/// The first element has no predecessor and is `None`. A zero predecessor
/// yields an infinite or NaN change, which is returned as-is.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut changes = Vec::with_capacity(values.len());
    if values.is_empty() {
        return changes;
    }

    changes.push(None);
    for pair in values.windows(2) {
        changes.push(Some(pair[1] / pair[0] - 1.0));
    }

    changes
}

/// Simple moving average over a fixed trailing window
#[derive(Debug, Clone)]
pub struct TrailingMean {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl TrailingMean {
    /// Create a new trailing mean with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a new value, evicting the oldest one once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Current mean, available once `period` values have been seen
    pub fn value(&self) -> Result<f64> {
        if self.values.len() < self.period {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for trailing mean. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Get the window length
    pub fn period(&self) -> usize {
        self.period
    }
}

/// Mean of the last `period` values of a series
pub fn trailing_mean(values: &[f64], period: usize) -> Result<f64> {
    let mut mean = TrailingMean::new(period)?;
    for &value in values {
        mean.update(value);
    }
    mean.value()
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute the mean of an empty series".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Sample standard deviation needs at least 2 values, have {}",
            values.len()
        )));
    }

    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;

    Ok(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_interpolates() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile(&values, 1.0).unwrap(), 4.0);

        // position 0.99 * 99 = 98.01 over 1..=100
        let hundred: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert_relative_eq!(quantile(&hundred, 0.99).unwrap(), 99.01, epsilon = 1e-9);
    }

    #[test]
    fn test_quantile_rejects_bad_input() {
        assert!(quantile(&[], 0.5).is_err());
        assert!(quantile(&[1.0], 1.5).is_err());
        assert!(quantile(&[1.0, f64::NAN], 0.5).is_err());
    }

    #[test]
    fn test_pct_change() {
        let changes = pct_change(&[100.0, 110.0, 99.0]);
        assert_eq!(changes.len(), 3);
        assert!(changes[0].is_none());
        assert_relative_eq!(changes[1].unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(changes[2].unwrap(), -0.1, epsilon = 1e-12);
        assert!(pct_change(&[]).is_empty());
    }

    #[test]
    fn test_trailing_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_relative_eq!(trailing_mean(&values, 5).unwrap(), 4.0);
        assert!(trailing_mean(&values[..3], 5).is_err());
        assert!(TrailingMean::new(0).is_err());
    }

    #[test]
    fn test_mean_and_std() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(sample_std(&values).unwrap(), 2.138089935, epsilon = 1e-8);
        assert!(sample_std(&[1.0]).is_err());
    }
}
