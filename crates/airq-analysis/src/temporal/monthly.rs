//! Month-of-year category counts averaged over the years covered.

use crate::association::{
    ChiSquareResult, ContingencyTable, LabeledMatrix, chi_square_test,
    standardized_adjusted_residuals,
};
use crate::config::AnalysisConfig;
use crate::dataset::{CATEGORY_COLUMN, ColumnKind, MONTH_LABELS, RecordSet};
use crate::error::{AnalysisError, Result, ResultExt};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const DAYS_PER_YEAR: f64 = 365.2425;

/// Number of years the record set covers, rounded, at least 1.
pub fn years_spanned(records: &RecordSet) -> u32 {
    let Some((first, last)) = records.time_span() else {
        return 1;
    };
    let days = (last - first).num_seconds() as f64 / 86_400.0;
    (days / DAYS_PER_YEAR).round().max(1.0) as u32
}

/// Count each category per calendar month (all years together) and divide
/// by the number of years.
///
/// Rows follow `ordering`, or the sorted distinct values of the column when
/// no ordering is given; columns are `Jan..Dec`. Values outside the ordering
/// are dropped. `divisor` overrides [`years_spanned`].
pub fn monthly_category_counts<S: AsRef<str>>(
    records: &RecordSet,
    column: &str,
    ordering: Option<&[S]>,
    divisor: Option<u32>,
) -> Result<LabeledMatrix> {
    records.schema().require(column, ColumnKind::Categorical)?;
    let values = records.categorical_values(column)?;

    let categories: Vec<String> = match ordering {
        Some(order) => order.iter().map(|s| s.as_ref().to_string()).collect(),
        None => values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let table = ContingencyTable::from_pairs(
        values.iter().zip(records.timestamps()).filter_map(|(value, ts)| {
            Some((value.as_deref()?, MONTH_LABELS[ts.month0() as usize]))
        }),
        categories.as_slice(),
        MONTH_LABELS.as_slice(),
    )
    .context(format!("Counting '{}' per month", column))?;

    let years = match divisor {
        Some(0) => {
            return Err(AnalysisError::InvalidInput(
                "years divisor must be at least 1".to_string(),
            ));
        }
        Some(years) => years,
        None => years_spanned(records),
    };
    debug!(
        "Monthly '{}' counts over {} categories, divided by {} years",
        column,
        categories.len(),
        years
    );

    let mut matrix = table.to_matrix();
    for cell in matrix.values.iter_mut().flatten() {
        *cell /= f64::from(years);
    }
    Ok(matrix)
}

/// Chi-square test and rescaled residuals of the averaged monthly category
/// table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAssociation {
    pub table: LabeledMatrix,
    pub test: ChiSquareResult,
    pub residuals: LabeledMatrix,
}

/// Test whether the air-quality category depends on the month.
///
/// Categories and months without any observation are left out of the table
/// first, since a zero row or column makes its expected frequencies zero.
/// An empty record set fails with [`AnalysisError::EmptyDataset`].
pub fn monthly_association(
    records: &RecordSet,
    config: &AnalysisConfig,
) -> Result<MonthlyAssociation> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }
    let counts = monthly_category_counts(
        records,
        CATEGORY_COLUMN,
        Some(config.category_order.as_slice()),
        config.years_divisor,
    )?;
    let table = drop_empty(&counts)?;

    let test = chi_square_test(&table).context("Monthly category chi-square test")?;
    let residuals = standardized_adjusted_residuals(&table, &test.expected)
        .context("Monthly category residuals")?;

    Ok(MonthlyAssociation {
        table,
        test,
        residuals,
    })
}

/// Remove all-zero rows and columns.
fn drop_empty(matrix: &LabeledMatrix) -> Result<LabeledMatrix> {
    let rows: Vec<usize> = (0..matrix.row_labels.len())
        .filter(|&i| matrix.values[i].iter().sum::<f64>() > 0.0)
        .collect();
    let col_sums = matrix.col_sums();
    let cols: Vec<usize> = (0..matrix.col_labels.len())
        .filter(|&j| col_sums[j] > 0.0)
        .collect();

    LabeledMatrix::new(
        rows.iter().map(|&i| matrix.row_labels[i].clone()).collect(),
        cols.iter().map(|&j| matrix.col_labels[j].clone()).collect(),
        rows.iter()
            .map(|&i| cols.iter().map(|&j| matrix.values[i][j]).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Schema;
    use polars::prelude::*;

    fn records(times: &[&str], categories: &[&str]) -> RecordSet {
        let frame = df![
            "datetime" => times,
            "kategori" => categories,
        ]
        .unwrap();
        let schema = Schema::new("datetime").with_column("kategori", ColumnKind::Categorical);
        RecordSet::new(frame, schema).unwrap()
    }

    // ==================== years spanned tests ====================

    #[test]
    fn test_years_spanned() {
        let rs = records(&["2013-03-01 00:00:00", "2017-02-28 23:00:00"], &["Good", "Good"]);
        assert_eq!(years_spanned(&rs), 4);

        let short = records(&["2013-03-01 00:00:00", "2013-03-05 00:00:00"], &["Good", "Good"]);
        assert_eq!(years_spanned(&short), 1);
    }

    // ==================== monthly count tests ====================

    #[test]
    fn test_counts_grouped_by_month_of_year() {
        let rs = records(
            &[
                "2013-01-05 00:00:00",
                "2013-01-06 00:00:00",
                "2014-01-05 00:00:00",
                "2014-03-01 00:00:00",
            ],
            &["Good", "Moderate", "Good", "Good"],
        );
        let order = ["Good", "Moderate", "Hazardous"];
        let m = monthly_category_counts(&rs, "kategori", Some(order.as_slice()), Some(2)).unwrap();

        assert_eq!(m.row_labels, vec!["Good", "Moderate", "Hazardous"]);
        assert_eq!(m.col_labels.len(), 12);
        assert_eq!(m.get_by_label("Good", "Jan"), Some(1.0));
        assert_eq!(m.get_by_label("Good", "Mar"), Some(0.5));
        assert_eq!(m.get_by_label("Moderate", "Jan"), Some(0.5));
        assert_eq!(m.get_by_label("Hazardous", "Jan"), Some(0.0));
        assert_eq!(m.get_by_label("Good", "Dec"), Some(0.0));
    }

    #[test]
    fn test_counts_without_ordering_use_sorted_values() {
        let rs = records(
            &["2013-02-01 00:00:00", "2013-02-02 00:00:00"],
            &["clean", "PM2.5"],
        );
        let m = monthly_category_counts::<&str>(&rs, "kategori", None, None).unwrap();
        assert_eq!(m.row_labels, vec!["PM2.5", "clean"]);
        assert_eq!(m.get_by_label("clean", "Feb"), Some(1.0));
        assert_eq!(m.without_row("clean").row_labels, vec!["PM2.5"]);
    }

    #[test]
    fn test_zero_divisor_is_rejected() {
        let rs = records(&["2013-02-01 00:00:00"], &["Good"]);
        assert!(monthly_category_counts::<&str>(&rs, "kategori", None, Some(0)).is_err());
    }

    // ==================== association tests ====================

    #[test]
    fn test_monthly_association_skips_empty_rows_and_months() {
        let mut times = Vec::new();
        let mut categories = Vec::new();
        for day in 1..=20 {
            times.push(format!("2013-01-{:02} 00:00:00", day));
            categories.push(if day <= 15 { "Good" } else { "Unhealthy" });
            times.push(format!("2013-07-{:02} 00:00:00", day));
            categories.push(if day <= 5 { "Good" } else { "Unhealthy" });
        }
        let times: Vec<&str> = times.iter().map(String::as_str).collect();
        let rs = records(&times, &categories);

        let result = monthly_association(&rs, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.table.row_labels, vec!["Good", "Unhealthy"]);
        assert_eq!(result.table.col_labels, vec!["Jan", "Jul"]);
        assert_eq!(result.table.values, vec![vec![15.0, 5.0], vec![5.0, 15.0]]);
        assert_eq!(result.test.degrees_of_freedom, 1);
        assert!((result.residuals.values[0][0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_association_empty_records() {
        let rs = records(&[], &[]);
        let err = monthly_association(&rs, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDataset));
        assert!(!err.is_degenerate());
    }

    #[test]
    fn test_monthly_association_single_category_is_degenerate() {
        let rs = records(
            &["2013-01-01 00:00:00", "2013-02-01 00:00:00"],
            &["Good", "Good"],
        );
        let err = monthly_association(&rs, &AnalysisConfig::default()).unwrap_err();
        assert!(err.is_degenerate());
    }
}
