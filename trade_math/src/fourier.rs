//! Fourier basis terms for periodic components

use crate::{MathError, Result};
use std::f64::consts::PI;

/// Sine/cosine pairs for harmonics `1..=order` of a cycle of `period` days.
///
/// Returns `[sin(2π·1·t/P), cos(2π·1·t/P), sin(2π·2·t/P), ...]`, so the
/// output has `2 * order` entries.
pub fn fourier_terms(t_days: f64, period: f64, order: usize) -> Result<Vec<f64>> {
    if !(period > 0.0) {
        return Err(MathError::InvalidInput(format!(
            "Period must be positive, got {}",
            period
        )));
    }

    let mut terms = Vec::with_capacity(2 * order);
    for harmonic in 1..=order {
        let angle = 2.0 * PI * harmonic as f64 * t_days / period;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }

    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_terms_repeat_each_period() {
        let a = fourier_terms(3.0, 7.0, 3).unwrap();
        let b = fourier_terms(10.0, 7.0, 3).unwrap();
        assert_eq!(a.len(), 6);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_origin_and_invalid_period() {
        let terms = fourier_terms(0.0, 365.25, 2).unwrap();
        assert_eq!(terms, vec![0.0, 1.0, 0.0, 1.0]);
        assert!(fourier_terms(1.0, 0.0, 2).is_err());
        assert!(fourier_terms(1.0, 7.0, 0).unwrap().is_empty());
    }
}
