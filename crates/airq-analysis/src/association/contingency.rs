//! Cross-tabulation of two categorical columns.

use super::LabeledMatrix;
use crate::dataset::{ColumnKind, RecordSet};
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Counts of co-occurring category pairs.
///
/// Rows and columns follow caller-supplied orderings, not the data: a label
/// with no observations is a zero row/column, and a value absent from the
/// ordering is not represented at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
    /// Observations skipped because a value was outside the orderings.
    pub dropped: u64,
}

impl ContingencyTable {
    /// Cross-tabulate `row_column` against `col_column`.
    ///
    /// Rows where either value is missing are skipped. Values missing from
    /// `row_order`/`col_order` are dropped and counted in
    /// [`ContingencyTable::dropped`].
    pub fn crosstab<R, C>(
        records: &RecordSet,
        row_column: &str,
        col_column: &str,
        row_order: &[R],
        col_order: &[C],
    ) -> Result<Self>
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        records.schema().require(row_column, ColumnKind::Categorical)?;
        records.schema().require(col_column, ColumnKind::Categorical)?;

        let row_values = records.categorical_values(row_column)?;
        let col_values = records.categorical_values(col_column)?;

        Self::from_pairs(
            row_values
                .iter()
                .zip(&col_values)
                .filter_map(|(r, c)| Some((r.as_deref()?, c.as_deref()?))),
            row_order,
            col_order,
        )
    }

    /// Tabulate `(row, column)` value pairs against fixed orderings.
    pub fn from_pairs<'a, I, R, C>(pairs: I, row_order: &[R], col_order: &[C]) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        R: AsRef<str>,
        C: AsRef<str>,
    {
        let row_index = index_of(row_order, "row")?;
        let col_index = index_of(col_order, "column")?;

        let mut counts = vec![vec![0u64; col_order.len()]; row_order.len()];
        let mut dropped = 0u64;

        for (row, col) in pairs {
            match (row_index.get(row), col_index.get(col)) {
                (Some(&i), Some(&j)) => counts[i][j] += 1,
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(
                "Dropped {} observations with categories outside the table orderings",
                dropped
            );
        }

        Ok(Self {
            row_labels: owned(row_order),
            col_labels: owned(col_order),
            counts,
            dropped,
        })
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    /// Sum of all cells.
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// The counts as a real-valued matrix.
    pub fn to_matrix(&self) -> LabeledMatrix {
        LabeledMatrix {
            row_labels: self.row_labels.clone(),
            col_labels: self.col_labels.clone(),
            values: self
                .counts
                .iter()
                .map(|row| row.iter().map(|&c| c as f64).collect())
                .collect(),
        }
    }
}

fn owned<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels.iter().map(|s| s.as_ref().to_string()).collect()
}

fn index_of<'a, S: AsRef<str>>(order: &'a [S], axis: &str) -> Result<HashMap<&'a str, usize>> {
    let mut seen = HashSet::new();
    let mut index = HashMap::with_capacity(order.len());
    for (i, label) in order.iter().enumerate() {
        let label = label.as_ref();
        if !seen.insert(label) {
            return Err(AnalysisError::InvalidInput(format!(
                "duplicate {} label '{}' in ordering",
                axis, label
            )));
        }
        index.insert(label, i);
    }
    Ok(index)
}
