//! Pearson chi-square test of independence on a two-way table.

use super::LabeledMatrix;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Outcome of a chi-square test of independence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    /// Expected frequencies under independence, labelled like the input.
    pub expected: LabeledMatrix,
}

impl ChiSquareResult {
    /// Upper `alpha` quantile of the chi-square distribution with this
    /// test's degrees of freedom; `None` when there are no degrees of
    /// freedom.
    pub fn critical_value(&self, alpha: f64) -> Option<f64> {
        if self.degrees_of_freedom == 0 {
            return None;
        }
        let dist = ChiSquared::new(self.degrees_of_freedom as f64).ok()?;
        Some(dist.inverse_cdf(1.0 - alpha))
    }

    /// Whether independence is rejected at level `alpha`.
    pub fn rejects_independence(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Expected frequencies under independence:
/// `row_total[i] * col_total[j] / grand_total`.
pub fn expected_frequencies(observed: &LabeledMatrix) -> LabeledMatrix {
    let row_totals = observed.row_sums();
    let col_totals = observed.col_sums();
    let total = observed.total();

    let values = row_totals
        .iter()
        .map(|r| {
            col_totals
                .iter()
                .map(|c| if total > 0.0 { r * c / total } else { 0.0 })
                .collect()
        })
        .collect();

    LabeledMatrix {
        row_labels: observed.row_labels.clone(),
        col_labels: observed.col_labels.clone(),
        values,
    }
}

/// Run the test on a table of non-negative frequencies.
///
/// No continuity correction is applied, including for 2x2 tables. A table
/// with a single row or column has zero degrees of freedom and p-value 1.
///
/// # Errors
///
/// * [`AnalysisError::InvalidInput`] for an empty or ragged table, or a
///   negative or non-finite cell.
/// * [`AnalysisError::DegenerateTable`] when any expected frequency is zero,
///   i.e. some row or column total is zero.
pub fn chi_square_test(observed: &LabeledMatrix) -> Result<ChiSquareResult> {
    observed.ensure_rectangular()?;
    let (rows, cols) = observed.shape();
    if rows == 0 || cols == 0 {
        return Err(AnalysisError::InvalidInput(
            "chi-square test needs at least one row and one column".to_string(),
        ));
    }
    if let Some(v) = observed
        .values
        .iter()
        .flatten()
        .find(|v| !v.is_finite() || **v < 0.0)
    {
        return Err(AnalysisError::InvalidInput(format!(
            "frequency {} is not a finite non-negative number",
            v
        )));
    }

    let expected = expected_frequencies(observed);

    let mut statistic = 0.0;
    for i in 0..rows {
        for j in 0..cols {
            let e = expected.values[i][j];
            if e <= 0.0 {
                return Err(AnalysisError::degenerate(format!(
                    "expected frequency is zero at ('{}', '{}')",
                    observed.row_labels[i], observed.col_labels[j]
                )));
            }
            let diff = observed.values[i][j] - e;
            statistic += diff * diff / e;
        }
    }

    let degrees_of_freedom = (rows - 1) * (cols - 1);
    let p_value = upper_tail(statistic, degrees_of_freedom);

    Ok(ChiSquareResult {
        statistic,
        p_value,
        degrees_of_freedom,
        expected,
    })
}

/// `P(X >= statistic)` for `X ~ chi2(dof)`.
fn upper_tail(statistic: f64, dof: usize) -> f64 {
    if dof == 0 {
        return 1.0;
    }
    match ChiSquared::new(dof as f64) {
        Ok(dist) => dist.sf(statistic),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: Vec<Vec<f64>>) -> LabeledMatrix {
        LabeledMatrix::from_rows(values).unwrap()
    }

    #[test]
    fn test_uniform_table_is_independent() {
        let result = chi_square_test(&table(vec![vec![50.0, 50.0], vec![50.0, 50.0]])).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
        assert_eq!(result.degrees_of_freedom, 1);
    }

    #[test]
    fn test_known_two_by_two() {
        let result = chi_square_test(&table(vec![vec![30.0, 10.0], vec![10.0, 30.0]])).unwrap();
        assert!((result.statistic - 20.0).abs() < 1e-9);
        assert_eq!(result.degrees_of_freedom, 1);
        // P(chi2_1 >= 20) = erfc(sqrt(10)) = 7.744e-6
        assert!((result.p_value - 7.744e-6).abs() < 1e-8);
        assert_eq!(result.expected.values, vec![vec![20.0, 20.0], vec![20.0, 20.0]]);
        assert!(result.rejects_independence(0.05));
    }

    #[test]
    fn test_product_of_marginals_gives_zero_statistic() {
        // rows in proportion 1:3, columns 1:2:5
        let result = chi_square_test(&table(vec![
            vec![10.0, 20.0, 50.0],
            vec![30.0, 60.0, 150.0],
        ]))
        .unwrap();
        assert!(result.statistic < 1e-9);
        assert_eq!(result.degrees_of_freedom, 2);
        assert!(result.p_value > 0.99);
    }

    #[test]
    fn test_expected_preserves_margins() {
        let observed = table(vec![vec![12.0, 5.0, 7.0], vec![3.0, 9.0, 14.0]]);
        let expected = expected_frequencies(&observed);
        for (a, b) in observed.row_sums().iter().zip(expected.row_sums()) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in observed.col_sums().iter().zip(expected.col_sums()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_margin_is_degenerate() {
        let err = chi_square_test(&table(vec![vec![5.0, 0.0], vec![7.0, 0.0]])).unwrap_err();
        assert!(err.is_degenerate());
        assert_eq!(err.error_code(), "DEGENERATE_TABLE");
    }

    #[test]
    fn test_negative_cell_rejected() {
        let err = chi_square_test(&table(vec![vec![5.0, -1.0], vec![7.0, 2.0]])).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_ragged_table_rejected() {
        let ragged = LabeledMatrix {
            row_labels: vec!["Good".into(), "Hazardous".into()],
            col_labels: vec!["N".into(), "S".into()],
            values: vec![vec![5.0, 1.0], vec![7.0]],
        };
        let err = chi_square_test(&ragged).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_single_row_has_no_degrees_of_freedom() {
        let result = chi_square_test(&table(vec![vec![5.0, 9.0, 2.0]])).unwrap();
        assert_eq!(result.degrees_of_freedom, 0);
        assert_eq!(result.p_value, 1.0);
        assert!(result.critical_value(0.05).is_none());
    }

    #[test]
    fn test_critical_value() {
        let result = chi_square_test(&table(vec![vec![30.0, 10.0], vec![10.0, 30.0]])).unwrap();
        // chi2.ppf(0.95, 1) = 3.841
        let critical = result.critical_value(0.05).unwrap();
        assert!((critical - 3.8415).abs() < 1e-3);
    }
}
