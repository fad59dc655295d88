//! Per-column summary statistics and distributions.

use crate::dataset::{ColumnKind, RecordSet};
use crate::error::{AnalysisError, Result, ResultExt};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Name of the count column in the grouped frequency frame.
const COUNT_COLUMN: &str = "__count";

/// Summary of a numeric column. Statistics are `None` when the column has
/// no values (and `variance` also when it has only one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    /// Sample variance (n - 1 denominator).
    pub variance: Option<f64>,
    /// Number of non-missing values.
    pub count: usize,
}

/// Summary of a categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    /// Number of non-missing values.
    pub total: usize,
    /// Number of distinct values.
    pub distinct: usize,
    /// Most frequent value; ties go to the value seen first.
    pub top: Option<String>,
    /// Occurrences of `top`.
    pub frequency: usize,
}

/// Summary of either kind of column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

impl ColumnSummary {
    pub fn column(&self) -> &str {
        match self {
            ColumnSummary::Numeric(s) => &s.column,
            ColumnSummary::Categorical(s) => &s.column,
        }
    }
}

/// One row of a frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Equal-width histogram. `edges` has one more entry than `counts`; every
/// bin is half-open except the last, which includes its right edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

// =============================================================================
// Record Set Entry Points
// =============================================================================

/// Summarize a numeric column.
pub fn describe_numeric(records: &RecordSet, column: &str) -> Result<NumericSummary> {
    summarize_numeric(&records.numeric_series(column)?)
}

/// Summarize a categorical column.
pub fn describe_categorical(records: &RecordSet, column: &str) -> Result<CategoricalSummary> {
    summarize_categorical(&records.categorical_series(column)?)
}

/// Summarize a column according to its schema kind.
pub fn describe(records: &RecordSet, column: &str) -> Result<ColumnSummary> {
    match records.schema().kind_of(column)? {
        ColumnKind::Numeric => describe_numeric(records, column).map(ColumnSummary::Numeric),
        ColumnKind::Categorical => {
            describe_categorical(records, column).map(ColumnSummary::Categorical)
        }
    }
}

/// Summarize every schema column (the station key excluded), in schema order.
pub fn describe_all(records: &RecordSet) -> Result<Vec<ColumnSummary>> {
    records
        .schema()
        .columns()
        .iter()
        .map(|spec| describe(records, &spec.name))
        .collect()
}

/// Frequency table of a categorical column, most frequent first.
pub fn value_counts(records: &RecordSet, column: &str) -> Result<Vec<ValueCount>> {
    count_values(&records.categorical_series(column)?)
}

/// Histogram of a numeric column with `bins` equal-width bins.
pub fn histogram(records: &RecordSet, column: &str, bins: usize) -> Result<Histogram> {
    build_histogram(&records.numeric_series(column)?, bins)
}

// =============================================================================
// Series Computations
// =============================================================================

/// Numeric summary of a series; nulls are ignored.
///
/// Quartiles interpolate linearly between order statistics. The series is
/// expected to carry missing values as null (see [`RecordSet::numeric_series`]).
pub fn summarize_numeric(series: &Series) -> Result<NumericSummary> {
    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let count = values.len() - values.null_count();

    Ok(NumericSummary {
        column: series.name().to_string(),
        q1: values.quantile(0.25, QuantileMethod::Linear)?,
        median: values.median(),
        q3: values.quantile(0.75, QuantileMethod::Linear)?,
        min: values.min(),
        mean: values.mean(),
        max: values.max(),
        variance: if count > 1 { values.var(1) } else { None },
        count,
    })
}

/// Categorical summary of a series; nulls are ignored.
pub fn summarize_categorical(series: &Series) -> Result<CategoricalSummary> {
    let counts = count_values(series)?;
    let top = counts.first();
    Ok(CategoricalSummary {
        column: series.name().to_string(),
        total: series.len() - series.null_count(),
        distinct: counts.len(),
        top: top.map(|c| c.value.clone()),
        frequency: top.map_or(0, |c| c.count),
    })
}

/// Count distinct values, sorted by count descending then first occurrence.
pub fn count_values(series: &Series) -> Result<Vec<ValueCount>> {
    let name = series.name().clone();
    let counts = series
        .cast(&DataType::String)?
        .into_frame()
        .lazy()
        .filter(col(name.clone()).is_not_null())
        .group_by_stable([col(name.clone())])
        .agg([len().cast(DataType::UInt64).alias(COUNT_COLUMN)])
        .sort(
            [COUNT_COLUMN],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()
        .context(format!("Counting values of '{}'", name))?;

    let values = counts.column(name.as_str())?.as_materialized_series();
    let totals = counts.column(COUNT_COLUMN)?.as_materialized_series();

    Ok(values
        .str()?
        .into_iter()
        .zip(totals.u64()?)
        .filter_map(|(value, count)| {
            Some(ValueCount {
                value: value?.to_string(),
                count: usize::try_from(count?).ok()?,
            })
        })
        .collect())
}

/// Equal-width histogram over `[min, max]` of the non-null values.
///
/// A constant column gets a unit-wide range centred on its value. A column
/// without values yields empty `edges` and `counts`.
pub fn build_histogram(series: &Series, bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(AnalysisError::InvalidInput(
            "histogram needs at least one bin".to_string(),
        ));
    }

    let column = series.name().to_string();
    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let (Some(min), Some(max)) = (values.min(), values.max()) else {
        return Ok(Histogram {
            column,
            edges: Vec::new(),
            counts: Vec::new(),
        });
    };

    let (low, high) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (high - low) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|k| low + width * k as f64).collect();

    let mut counts = vec![0usize; bins];
    for v in values.into_iter().flatten() {
        let bin = (((v - low) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    Ok(Histogram {
        column,
        edges,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Schema;
    use polars::prelude::*;

    fn records() -> RecordSet {
        let frame = df![
            "datetime" => ["2013-03-01 00:00:00", "2013-03-01 01:00:00", "2013-03-01 02:00:00",
                           "2013-03-01 03:00:00", "2013-03-01 04:00:00"],
            "PM2.5" => [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)],
            "wd" => [Some("N"), Some("S"), Some("S"), None, Some("N")],
        ]
        .unwrap();
        let schema = Schema::new("datetime")
            .with_column("PM2.5", ColumnKind::Numeric)
            .with_column("wd", ColumnKind::Categorical);
        RecordSet::new(frame, schema).unwrap()
    }

    // ==================== numeric summary tests ====================

    #[test]
    fn test_describe_numeric() {
        let summary = describe_numeric(&records(), "PM2.5").unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(4.0));
        assert_eq!(summary.mean, Some(2.5));
        assert_eq!(summary.q1, Some(1.75));
        assert_eq!(summary.median, Some(2.5));
        assert_eq!(summary.q3, Some(3.25));
        // sample variance of 1..4 = 5 / 3
        assert!((summary.variance.unwrap() - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_numeric_empty() {
        let missing = Series::new("x".into(), &[None::<f64>, None]);
        let summary = summarize_numeric(&missing).unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.median, None);
        assert_eq!(summary.variance, None);
    }

    #[test]
    fn test_summarize_numeric_single_value() {
        let summary = summarize_numeric(&Series::new("x".into(), &[7.0])).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.median, Some(7.0));
        assert_eq!(summary.variance, None);
    }

    #[test]
    fn test_describe_numeric_rejects_categorical() {
        let err = describe_numeric(&records(), "wd").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_COLUMN_TYPE");
    }

    // ==================== categorical summary tests ====================

    #[test]
    fn test_describe_categorical() {
        let summary = describe_categorical(&records(), "wd").unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.distinct, 2);
        // N and S both appear twice; N was seen first
        assert_eq!(summary.top.as_deref(), Some("N"));
        assert_eq!(summary.frequency, 2);
    }

    #[test]
    fn test_describe_categorical_rejects_numeric() {
        let err = describe_categorical(&records(), "PM2.5").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_COLUMN_TYPE");
    }

    #[test]
    fn test_count_values_order() {
        let values = Series::new(
            "x".into(),
            &[Some("b"), Some("a"), None, Some("a"), Some("c"), Some("b"), Some("a")],
        );
        let counts = count_values(&values).unwrap();
        let order: Vec<(&str, usize)> =
            counts.iter().map(|c| (c.value.as_str(), c.count)).collect();
        assert_eq!(order, vec![("a", 3), ("b", 2), ("c", 1)]);
    }

    #[test]
    fn test_count_values_ties_keep_first_occurrence() {
        let values = Series::new("wd".into(), &["S", "N", "E", "N", "S", "E"]);
        let counts = count_values(&values).unwrap();
        let order: Vec<&str> = counts.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(order, vec!["S", "N", "E"]);

        let empty = count_values(&Series::new("wd".into(), &[None::<&str>])).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_describe_numeric_ignores_nan() {
        let frame = df![
            "datetime" => ["2013-03-01", "2013-03-02", "2013-03-03"],
            "x" => [1.0, f64::NAN, 3.0],
        ]
        .unwrap();
        let schema = Schema::new("datetime").with_column("x", ColumnKind::Numeric);
        let rs = RecordSet::new(frame, schema).unwrap();

        let summary = describe_numeric(&rs, "x").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, Some(2.0));
        assert_eq!(summary.max, Some(3.0));
        assert_eq!(summary.variance, Some(2.0));
    }

    #[test]
    fn test_describe_dispatches_on_kind() {
        let all = describe_all(&records()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(matches!(all[0], ColumnSummary::Numeric(_)));
        assert!(matches!(all[1], ColumnSummary::Categorical(_)));
        assert_eq!(all[1].column(), "wd");
    }

    #[test]
    fn test_summary_serialization_is_tagged() {
        let summary = describe(&records(), "wd").unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "categorical");
        assert_eq!(json["top"], "N");
    }

    // ==================== histogram tests ====================

    #[test]
    fn test_histogram_bins() {
        let values = Series::new(
            "x".into(),
            &[Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0), None],
        );
        let hist = build_histogram(&values, 4).unwrap();
        assert_eq!(hist.column, "x");
        assert_eq!(hist.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        // The maximum lands in the closed last bin
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_histogram_constant_and_empty() {
        let constant = Series::new("x".into(), &[5.0, 5.0]);
        let hist = build_histogram(&constant, 2).unwrap();
        assert_eq!(hist.edges, vec![4.5, 5.0, 5.5]);
        assert_eq!(hist.counts, vec![0, 2]);

        let empty = build_histogram(&Series::new("x".into(), &[None::<f64>]), 3).unwrap();
        assert!(empty.counts.is_empty());

        assert!(build_histogram(&constant, 0).is_err());
    }

    #[test]
    fn test_histogram_from_records() {
        let hist = histogram(&records(), "PM2.5", 3).unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 4);
    }
}
