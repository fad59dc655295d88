//! Standardized adjusted residuals of a two-way table.
//!
//! Each cell's deviation from its expected frequency is divided by its own
//! standard error, and the whole residual matrix is then rescaled to zero
//! mean and unit standard deviation. The rescaling pools every cell of the
//! matrix together; it is never done per row or per column.

use super::LabeledMatrix;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// A cell whose rescaled residual lies beyond the critical z value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantCell {
    pub row: String,
    pub col: String,
    pub z: f64,
}

/// Two-sided critical value of the standard normal at level `alpha`
/// (1.96 for 0.05).
pub fn z_critical(alpha: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(1.0 - alpha / 2.0),
        Err(_) => f64::NAN,
    }
}

/// Compute the rescaled standardized adjusted residuals.
///
/// With `p_col[j]` and `p_row[i]` the column and row shares of the expected
/// total, each cell is
/// `(o - e) / sqrt(e * (1 - p_col[j]) * (1 - p_row[i]))`; the resulting
/// matrix is then z-scored with its pooled mean and population standard
/// deviation. Labels are taken from `observed`.
///
/// # Errors
///
/// * [`AnalysisError::ShapeMismatch`] if the matrices differ in shape.
/// * [`AnalysisError::DegenerateTable`] if a cell's variance term is not
///   positive: a zero expected frequency, or a row/column holding the whole
///   total, which is always the case for a 1xN or Nx1 table.
/// * [`AnalysisError::ZeroPooledVariance`] if every residual is identical,
///   e.g. a table whose observed counts equal the expected ones.
pub fn standardized_adjusted_residuals(
    observed: &LabeledMatrix,
    expected: &LabeledMatrix,
) -> Result<LabeledMatrix> {
    observed.ensure_same_shape(expected)?;
    let (rows, cols) = observed.shape();
    if rows == 0 || cols == 0 {
        return Err(AnalysisError::InvalidInput(
            "residuals need at least one row and one column".to_string(),
        ));
    }

    let total = expected.total();
    let col_share: Vec<f64> = expected.col_sums().iter().map(|c| c / total).collect();
    let row_share: Vec<f64> = expected.row_sums().iter().map(|r| r / total).collect();

    let mut residuals = vec![vec![0.0; cols]; rows];
    for i in 0..rows {
        for j in 0..cols {
            let e = expected.values[i][j];
            let variance = e * (1.0 - col_share[j]) * (1.0 - row_share[i]);
            if !(variance > 0.0) {
                return Err(AnalysisError::degenerate(format!(
                    "non-positive residual variance at ('{}', '{}')",
                    observed.row_labels[i], observed.col_labels[j]
                )));
            }
            residuals[i][j] = (observed.values[i][j] - e) / variance.sqrt();
        }
    }

    let n = (rows * cols) as f64;
    let mean = residuals.iter().flatten().sum::<f64>() / n;
    let variance = residuals
        .iter()
        .flatten()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();

    // Residuals equal up to rounding noise count as identical.
    let scale = residuals
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, r| acc.max(r.abs()))
        .max(1.0);
    if !(std > scale * 1e-12) {
        return Err(AnalysisError::ZeroPooledVariance);
    }

    for cell in residuals.iter_mut().flatten() {
        *cell = (*cell - mean) / std;
    }

    Ok(LabeledMatrix {
        row_labels: observed.row_labels.clone(),
        col_labels: observed.col_labels.clone(),
        values: residuals,
    })
}

/// Cells of a rescaled residual matrix with `|z| > critical`, in row-major
/// order.
pub fn significant_cells(residuals: &LabeledMatrix, critical: f64) -> Vec<SignificantCell> {
    let mut cells = Vec::new();
    for (row, values) in residuals.row_labels.iter().zip(&residuals.values) {
        for (col, &z) in residuals.col_labels.iter().zip(values) {
            if z.abs() > critical {
                cells.push(SignificantCell {
                    row: row.clone(),
                    col: col.clone(),
                    z,
                });
            }
        }
    }
    cells
}
