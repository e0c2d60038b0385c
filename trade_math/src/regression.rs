//! Ridge-regularised linear least squares
//!
//! Solves `(XᵀX + diag(λ)) β = Xᵀy` with a Cholesky factorisation, falling
//! back to LU when the system is not numerically positive definite.

use crate::{MathError, Result};
use nalgebra::{DMatrix, DVector};

/// Dense row-major design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DesignMatrix {
    /// Create an empty matrix with `cols` columns
    pub fn with_columns(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    /// Append one row of features
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.cols {
            return Err(MathError::InvalidInput(format!(
                "Row has {} features, matrix has {} columns",
                row.len(),
                self.cols
            )));
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `i`
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copy of the matrix with row `i` multiplied by `weights[i]`
    pub fn scale_rows(&self, weights: &[f64]) -> Result<DesignMatrix> {
        if weights.len() != self.rows {
            return Err(MathError::InvalidInput(format!(
                "Expected {} row weights, got {}",
                self.rows,
                weights.len()
            )));
        }

        let mut data = self.data.clone();
        for (i, weight) in weights.iter().enumerate() {
            for value in &mut data[i * self.cols..(i + 1) * self.cols] {
                *value *= weight;
            }
        }

        Ok(DesignMatrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// `Xβ` for every row
    pub fn apply(&self, coefficients: &[f64]) -> Result<Vec<f64>> {
        if coefficients.len() != self.cols {
            return Err(MathError::InvalidInput(format!(
                "Expected {} coefficients, got {}",
                self.cols,
                coefficients.len()
            )));
        }

        Ok((0..self.rows)
            .map(|i| dot(self.row(i), coefficients))
            .collect())
    }
}

/// Dot product of two equally sized slices
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Fit ridge coefficients with a per-column penalty
pub fn ridge(design: &DesignMatrix, target: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if design.rows() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            design.rows(),
            target.len()
        )));
    }
    if penalties.len() != design.cols() {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            design.cols(),
            penalties.len()
        )));
    }
    if penalties.iter().any(|p| *p < 0.0 || !p.is_finite()) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }
    if design.cols() == 0 {
        return Ok(Vec::new());
    }
    if design.rows() == 0 {
        return Err(MathError::InsufficientData(
            "Cannot fit a regression without observations".to_string(),
        ));
    }

    let x = DMatrix::from_row_slice(design.rows(), design.cols(), &design.data);
    let y = DVector::from_column_slice(target);
    let xt = x.transpose();

    let mut gram = &xt * &x;
    for (j, penalty) in penalties.iter().enumerate() {
        gram[(j, j)] += penalty;
    }
    let rhs = &xt * &y;

    let solution = match gram.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => gram.lu().solve(&rhs).ok_or_else(|| {
            MathError::CalculationError("Normal equations are singular".to_string())
        })?,
    };

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Ridge solution contains non-finite coefficients".to_string(),
        ));
    }

    Ok(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_design(n: usize) -> (DesignMatrix, Vec<f64>) {
        let mut design = DesignMatrix::with_columns(2);
        let mut target = Vec::new();
        for i in 0..n {
            let x = i as f64;
            design.push_row(&[1.0, x]).unwrap();
            target.push(3.0 + 2.0 * x);
        }
        (design, target)
    }

    #[test]
    fn test_unpenalised_fit_recovers_line() {
        let (design, target) = line_design(10);
        let beta = ridge(&design, &target, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(beta[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 2.0, epsilon = 1e-9);

        let fitted = design.apply(&beta).unwrap();
        for (f, t) in fitted.iter().zip(target.iter()) {
            assert_relative_eq!(*f, *t, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let (design, target) = line_design(10);
        let free = ridge(&design, &target, &[0.0, 0.0]).unwrap();
        let shrunk = ridge(&design, &target, &[0.0, 1e6]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
    }

    #[test]
    fn test_collinear_columns_are_resolved_by_penalty() {
        let mut design = DesignMatrix::with_columns(2);
        for _ in 0..5 {
            design.push_row(&[1.0, 1.0]).unwrap();
        }
        let beta = ridge(&design, &[2.0; 5], &[1e-3, 1e-3]).unwrap();
        assert_relative_eq!(beta[0], beta[1], epsilon = 1e-9);
        assert_relative_eq!(beta[0] + beta[1], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_scale_rows() {
        let (design, _) = line_design(3);
        let scaled = design.scale_rows(&[1.0, 2.0, 0.5]).unwrap();
        assert_eq!(scaled.row(1), &[2.0, 2.0]);
        assert_eq!(scaled.row(2), &[0.5, 1.0]);
        assert!(design.scale_rows(&[1.0]).is_err());
    }

    #[test]
    fn test_shape_errors() {
        let (design, target) = line_design(4);
        assert!(ridge(&design, &target[..3], &[0.0, 0.0]).is_err());
        assert!(ridge(&design, &target, &[0.0]).is_err());
        assert!(ridge(&design, &target, &[0.0, -1.0]).is_err());

        let mut design = DesignMatrix::with_columns(2);
        assert!(design.push_row(&[1.0]).is_err());
    }
}
