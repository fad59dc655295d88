//! Median resampling of numeric columns into time buckets.

use crate::dataset::RecordSet;
use crate::error::{AnalysisError, Result, ResultExt};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Length of a "yearly" bucket in days.
pub const YEAR_WINDOW_DAYS: i64 = 366;

/// Bucket width of a resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Calendar days.
    #[default]
    Daily,
    /// Calendar months, labelled by their last day.
    Monthly,
    /// Fixed 366-day windows starting at midnight of the first observation's
    /// day. These drift against calendar years.
    Yearly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        }
    }

    /// Index of the bucket holding `ts`, counted from the bucket of `origin`.
    fn bucket_index(&self, origin: NaiveDate, ts: NaiveDateTime) -> usize {
        let date = ts.date();
        let index = match self {
            Granularity::Daily => (date - origin).num_days(),
            Granularity::Monthly => month_ordinal(date) - month_ordinal(origin),
            Granularity::Yearly => (date - origin).num_days() / YEAR_WINDOW_DAYS,
        };
        index.max(0) as usize
    }

    /// Label of bucket `index`: the day, the month-end date, or the window
    /// start date.
    fn bucket_label(&self, origin: NaiveDate, index: usize) -> Option<NaiveDate> {
        match self {
            Granularity::Daily => origin.checked_add_signed(TimeDelta::days(index as i64)),
            Granularity::Monthly => origin
                .with_day(1)?
                .checked_add_months(Months::new(u32::try_from(index).ok()?.checked_add(1)?))?
                .pred_opt(),
            Granularity::Yearly => {
                origin.checked_add_signed(TimeDelta::days(index as i64 * YEAR_WINDOW_DAYS))
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Granularity::Daily),
            "monthly" | "month" | "m" => Ok(Granularity::Monthly),
            "yearly" | "year" | "y" => Ok(Granularity::Yearly),
            other => Err(AnalysisError::InvalidInput(format!(
                "unknown granularity '{}'",
                other
            ))),
        }
    }
}

fn month_ordinal(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Per-bucket medians of a set of numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    pub granularity: Granularity,
    pub columns: Vec<String>,
    /// One label per bucket, in time order.
    pub labels: Vec<NaiveDate>,
    /// `values[bucket][column]`; `None` where the bucket has no values.
    pub values: Vec<Vec<Option<f64>>>,
}

impl ResampledSeries {
    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All bucket values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let j = self.columns.iter().position(|c| c == name)?;
        Some(self.values.iter().map(|row| row[j]).collect())
    }
}

/// Name of the bucket key column in the grouped frame.
const BUCKET_KEY: &str = "__bucket";

/// Resample `columns` of a record set into `granularity` buckets.
///
/// Buckets run from the one holding the first observation to the one holding
/// the last, with no gaps. Each cell is the median of the non-missing values
/// falling in that bucket. An empty record set yields an empty series.
pub fn resample<S: AsRef<str>>(
    records: &RecordSet,
    granularity: Granularity,
    columns: &[S],
) -> Result<ResampledSeries> {
    let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
    if let Some(duplicate) = names
        .iter()
        .enumerate()
        .find_map(|(i, name)| names[..i].contains(name).then_some(name))
    {
        return Err(AnalysisError::InvalidInput(format!(
            "column '{}' requested twice",
            duplicate
        )));
    }
    let series = names
        .iter()
        .map(|name| records.numeric_series(name))
        .collect::<Result<Vec<_>>>()?;

    let Some((first, last)) = records.time_span() else {
        return Ok(ResampledSeries {
            granularity,
            columns: names,
            labels: Vec::new(),
            values: Vec::new(),
        });
    };

    let origin = first.date();
    let bucket_count = granularity.bucket_index(origin, last) + 1;
    let labels = (0..bucket_count)
        .map(|k| {
            granularity.bucket_label(origin, k).ok_or_else(|| {
                AnalysisError::InvalidInput(format!("bucket {} is outside the date range", k))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let keys: Vec<i64> = records
        .timestamps()
        .iter()
        .map(|&ts| granularity.bucket_index(origin, ts) as i64)
        .collect();

    let mut frame_columns = vec![Series::new(BUCKET_KEY.into(), keys).into_column()];
    frame_columns.extend(series.into_iter().map(Series::into_column));

    let medians = DataFrame::new(frame_columns)?
        .lazy()
        .group_by([col(BUCKET_KEY)])
        .agg(
            names
                .iter()
                .map(|name| col(name.as_str()).median())
                .collect::<Vec<_>>(),
        )
        .collect()
        .context(format!("Grouping {} buckets", granularity))?;

    let buckets = medians
        .column(BUCKET_KEY)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let buckets = buckets.i64()?;

    let mut values = vec![vec![None; names.len()]; bucket_count];
    for (j, name) in names.iter().enumerate() {
        let column = medians
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        for (bucket, median) in buckets.into_iter().zip(column.f64()?) {
            if let Some(row) = bucket
                .and_then(|k| usize::try_from(k).ok())
                .and_then(|k| values.get_mut(k))
            {
                row[j] = median;
            }
        }
    }

    debug!(
        "Resampled {} rows into {} {} buckets",
        records.len(),
        bucket_count,
        granularity
    );

    Ok(ResampledSeries {
        granularity,
        columns: names,
        labels,
        values,
    })
}
