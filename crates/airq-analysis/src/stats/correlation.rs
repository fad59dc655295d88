//! Pairwise Pearson correlation over numeric columns.

use crate::dataset::{ColumnKind, RecordSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Symmetric matrix of Pearson coefficients.
///
/// An entry is `None` when the correlation is undefined: one of the two
/// columns has zero variance over their complete pairs, or there are fewer
/// than two complete pairs. A zero-variance column therefore also has an
/// undefined diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Column pairs `(a, b)` with `a` before `b` (or `a == b`) whose
    /// correlation is undefined.
    pub fn undefined_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in i..self.columns.len() {
                if self.values[i][j].is_none() {
                    pairs.push((self.columns[i].clone(), self.columns[j].clone()));
                }
            }
        }
        pairs
    }
}

/// Correlation matrix of `columns`, or of every numeric schema column when
/// `columns` is `None`.
///
/// Each pair uses the rows where both values are present.
pub fn correlation_matrix(
    records: &RecordSet,
    columns: Option<&[String]>,
) -> Result<CorrelationMatrix> {
    let names: Vec<String> = match columns {
        Some(columns) => columns.to_vec(),
        None => records
            .schema()
            .numeric_columns()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    for name in &names {
        records.schema().require(name, ColumnKind::Numeric)?;
    }

    let series = names
        .iter()
        .map(|name| records.numeric_values(name))
        .collect::<Result<Vec<_>>>()?;

    let matrix = correlate(names, &series);
    let undefined = matrix.undefined_pairs();
    if !undefined.is_empty() {
        debug!("Undefined correlations: {:?}", undefined);
    }
    Ok(matrix)
}

/// Build the matrix from aligned value vectors.
pub fn correlate(columns: Vec<String>, series: &[Vec<Option<f64>>]) -> CorrelationMatrix {
    let n = series.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&series[i], &series[j]);
            let r = if i == j { r.map(|_| 1.0) } else { r };
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix { columns, values }
}

/// Pearson coefficient over complete pairs, clamped to `[-1, 1]`.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
