//! Real-valued matrix with row and column labels.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// A dense, row-major matrix whose rows and columns carry labels.
///
/// Used for expected frequencies, residuals and averaged monthly counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMatrix {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    /// Build a matrix, checking that the values match the label counts.
    pub fn new(
        row_labels: Vec<String>,
        col_labels: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let matrix = Self {
            row_labels,
            col_labels,
            values,
        };
        matrix.ensure_rectangular()?;
        Ok(matrix)
    }

    /// Build a matrix labelled `0..rows` / `0..cols`.
    pub fn from_rows(values: Vec<Vec<f64>>) -> Result<Self> {
        let cols = values.first().map_or(0, Vec::len);
        let row_labels = (0..values.len()).map(|i| i.to_string()).collect();
        let col_labels = (0..cols).map(|j| j.to_string()).collect();
        Self::new(row_labels, col_labels, values)
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row)?.get(col).copied()
    }

    /// Value addressed by labels.
    pub fn get_by_label(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.row_labels.iter().position(|l| l == row)?;
        let j = self.col_labels.iter().position(|l| l == col)?;
        self.get(i, j)
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.values.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.col_labels.len()];
        for row in &self.values {
            for (sum, v) in sums.iter_mut().zip(row) {
                *sum += v;
            }
        }
        sums
    }

    pub fn total(&self) -> f64 {
        self.values.iter().flatten().sum()
    }

    /// Copy of the matrix without the row labelled `label` (unchanged if no
    /// such row exists).
    pub fn without_row(&self, label: &str) -> LabeledMatrix {
        let (row_labels, values) = self
            .row_labels
            .iter()
            .zip(&self.values)
            .filter(|(l, _)| l.as_str() != label)
            .map(|(l, row)| (l.clone(), row.clone()))
            .unzip();
        LabeledMatrix {
            row_labels,
            col_labels: self.col_labels.clone(),
            values,
        }
    }

    /// Reorder rows and columns: output row `k` is input row `rows[k]`, and
    /// likewise for columns.
    pub fn permute(&self, rows: &[usize], cols: &[usize]) -> Result<LabeledMatrix> {
        let (n_rows, n_cols) = self.shape();
        if !is_permutation(rows, n_rows) || !is_permutation(cols, n_cols) {
            return Err(AnalysisError::InvalidInput(
                "index lists must be permutations of the matrix axes".to_string(),
            ));
        }
        Ok(LabeledMatrix {
            row_labels: rows.iter().map(|&i| self.row_labels[i].clone()).collect(),
            col_labels: cols.iter().map(|&j| self.col_labels[j].clone()).collect(),
            values: rows
                .iter()
                .map(|&i| cols.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
        })
    }

    /// Fail with [`AnalysisError::InvalidInput`] unless there is one row of
    /// values per row label and every row has one value per column label.
    ///
    /// The fields are public, so a matrix built by hand or deserialized may
    /// be ragged; computations check this before indexing.
    pub fn ensure_rectangular(&self) -> Result<()> {
        if self.values.len() != self.row_labels.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} rows of values for {} row labels",
                self.values.len(),
                self.row_labels.len()
            )));
        }
        if let Some((i, row)) = self
            .values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.col_labels.len())
        {
            return Err(AnalysisError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                self.col_labels.len()
            )));
        }
        Ok(())
    }

    /// Fail with [`AnalysisError::ShapeMismatch`] unless both matrices have
    /// the same shape, or with [`AnalysisError::InvalidInput`] if either is
    /// ragged.
    pub fn ensure_same_shape(&self, other: &LabeledMatrix) -> Result<()> {
        self.ensure_rectangular()?;
        other.ensure_rectangular()?;
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(AnalysisError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            })
        }
    }
}

fn is_permutation(indices: &[usize], len: usize) -> bool {
    if indices.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    indices
        .iter()
        .all(|&i| i < len && !std::mem::replace(&mut seen[i], true))
}
