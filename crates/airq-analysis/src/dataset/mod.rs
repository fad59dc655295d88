//! Time-indexed record set.
//!
//! A [`RecordSet`] wraps a polars [`DataFrame`] together with its parsed
//! timestamps and the [`Schema`] that tags each analysed column as numeric
//! or categorical. Rows are kept sorted by timestamp; every derived table is
//! computed from a record set passed in explicitly.

pub mod loader;
mod schema;

pub use schema::{
    CATEGORY_COLUMN, CATEGORY_ORDER, CLEAN_POLLUTANT, ColumnKind, ColumnSpec, MONTH_LABELS,
    NUMERIC_COLUMNS, POLLUTANT_COLUMN, STATION_COLUMN, STATIONS, Schema, StationFilter,
    TIMESTAMP_COLUMN, WIND_COLUMN, WIND_ORDER,
};

use crate::error::{AnalysisError, Result, ResultExt};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use polars::prelude::*;
use tracing::debug;

/// Accepted string layouts of the timestamp column.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// An ordered, time-indexed set of observations.
#[derive(Debug, Clone)]
pub struct RecordSet {
    frame: DataFrame,
    timestamps: Vec<NaiveDateTime>,
    schema: Schema,
}

impl RecordSet {
    /// Build a record set, parsing the timestamp column and sorting rows by
    /// time (stable, so equal timestamps keep their input order).
    ///
    /// Fails if any schema column is absent from the frame or a timestamp
    /// cannot be parsed.
    pub fn new(frame: DataFrame, schema: Schema) -> Result<Self> {
        for spec in schema.columns() {
            if frame.column(&spec.name).is_err() {
                return Err(AnalysisError::ColumnNotFound(spec.name.clone()));
            }
        }
        if let Some(station) = schema.station_column()
            && frame.column(station).is_err()
        {
            return Err(AnalysisError::ColumnNotFound(station.to_string()));
        }

        let timestamps = parse_timestamps(&frame, schema.timestamp_column())?;

        if timestamps.windows(2).all(|w| w[0] <= w[1]) {
            return Ok(Self {
                frame,
                timestamps,
                schema,
            });
        }

        debug!("Sorting {} rows by {}", frame.height(), schema.timestamp_column());
        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);

        let indices = IdxCa::from_vec(
            "order".into(),
            order.iter().map(|&i| i as IdxSize).collect(),
        );
        let frame = frame.take(&indices).context("Sorting record set by time")?;
        let timestamps = order.iter().map(|&i| timestamps[i]).collect();

        Ok(Self {
            frame,
            timestamps,
            schema,
        })
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The underlying frame, sorted by time.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parsed timestamps, one per row, non-decreasing.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// First and last timestamp, or `None` when empty.
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Restrict the record set to one station.
    ///
    /// [`StationFilter::Overall`] returns an unchanged copy.
    pub fn filter_station(&self, filter: &StationFilter) -> Result<RecordSet> {
        let StationFilter::Station(name) = filter else {
            return Ok(self.clone());
        };
        filter.validate()?;

        let station_column = self
            .schema
            .station_column()
            .ok_or_else(|| AnalysisError::ColumnNotFound(STATION_COLUMN.to_string()))?;
        let keep: Vec<bool> = self
            .categorical_values(station_column)?
            .iter()
            .map(|v| v.as_deref() == Some(name.as_str()))
            .collect();

        let mask = BooleanChunked::from_slice("station_mask".into(), &keep);
        let frame = self
            .frame
            .filter(&mask)
            .context(format!("Filtering station '{}'", name))?;
        let timestamps = self
            .timestamps
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(t, _)| *t)
            .collect::<Vec<_>>();

        debug!("Station '{}' keeps {} of {} rows", name, timestamps.len(), self.len());

        Ok(RecordSet {
            frame,
            timestamps,
            schema: self.schema.clone(),
        })
    }

    /// A numeric column as a `Float64` series named after the column, with
    /// NaN turned into null.
    pub fn numeric_series(&self, column: &str) -> Result<Series> {
        self.schema.require(column, ColumnKind::Numeric)?;
        let series = self
            .frame
            .column(column)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values: Float64Chunked = series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(values.with_name(column.into()).into_series())
    }

    /// A categorical column as a `String` series named after the column.
    pub fn categorical_series(&self, column: &str) -> Result<Series> {
        self.schema.require(column, ColumnKind::Categorical)?;
        Ok(self
            .frame
            .column(column)?
            .as_materialized_series()
            .cast(&DataType::String)?)
    }

    /// Values of a numeric column as `f64`; nulls and NaN become `None`.
    pub fn numeric_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        Ok(self.numeric_series(column)?.f64()?.into_iter().collect())
    }

    /// Values of a categorical column as strings; nulls become `None`.
    pub fn categorical_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        Ok(self
            .categorical_series(column)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    /// Number of pages of the raw data view (`len / rows_per_page + 1`).
    pub fn page_count(&self, rows_per_page: usize) -> usize {
        self.len() / rows_per_page.max(1) + 1
    }

    /// One 1-based page of the raw data view.
    ///
    /// The last page may be short or empty, as in a paged table whose page
    /// count rounds up one past an exact multiple.
    pub fn page(&self, page: usize, rows_per_page: usize) -> Result<DataFrame> {
        if rows_per_page == 0 {
            return Err(AnalysisError::InvalidInput(
                "rows_per_page must be at least 1".to_string(),
            ));
        }
        let count = self.page_count(rows_per_page);
        if page == 0 || page > count {
            return Err(AnalysisError::InvalidInput(format!(
                "page {} out of range 1..={}",
                page, count
            )));
        }
        let start = (page - 1) * rows_per_page;
        Ok(self.frame.slice(start as i64, rows_per_page))
    }
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

fn parse_timestamps(frame: &DataFrame, column: &str) -> Result<Vec<NaiveDateTime>> {
    let series = frame
        .column(column)
        .map_err(|_| AnalysisError::ColumnNotFound(column.to_string()))?
        .as_materialized_series();

    let invalid = |value: String| AnalysisError::InvalidTimestamp {
        column: column.to_string(),
        value,
    };

    match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| {
                let v = v.ok_or_else(|| invalid("null".to_string()))?;
                parse_timestamp_str(v).ok_or_else(|| invalid(v.to_string()))
            })
            .collect(),
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = series.cast(&DataType::Int64)?;
            physical
                .i64()?
                .into_iter()
                .map(|v| {
                    let v = v.ok_or_else(|| invalid("null".to_string()))?;
                    let parsed = match unit {
                        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                    };
                    parsed
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| invalid(v.to_string()))
                })
                .collect()
        }
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| invalid("1970-01-01".to_string()))?;
            let physical = series.cast(&DataType::Int32)?;
            physical
                .i32()?
                .into_iter()
                .map(|v| {
                    let v = v.ok_or_else(|| invalid("null".to_string()))?;
                    Ok(epoch + TimeDelta::days(i64::from(v)))
                })
                .collect()
        }
        _ => Err(AnalysisError::invalid_column_type(column, "a timestamp")),
    }
}

/// Parse a timestamp string in one of the accepted layouts; a bare date is
/// taken as midnight.
pub fn parse_timestamp_str(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new("datetime")
            .with_station_column("station")
            .with_column("PM2.5", ColumnKind::Numeric)
            .with_column("wd", ColumnKind::Categorical)
    }

    fn sample_frame() -> DataFrame {
        df![
            "datetime" => ["2013-03-01 02:00:00", "2013-03-01 00:00:00", "2013-03-01 01:00:00"],
            "station" => ["Dongsi", "Changping", "Dongsi"],
            "PM2.5" => [Some(30.0), Some(10.0), None],
            "wd" => [Some("N"), None, Some("NE")],
        ]
        .unwrap()
    }

    #[test]
    fn test_new_sorts_rows_by_time() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.timestamps().windows(2).all(|w| w[0] <= w[1]));

        let pm = records.numeric_values("PM2.5").unwrap();
        assert_eq!(pm, vec![Some(10.0), None, Some(30.0)]);

        let wd = records.categorical_values("wd").unwrap();
        assert_eq!(wd, vec![None, Some("NE".to_string()), Some("N".to_string())]);
    }

    #[test]
    fn test_new_missing_schema_column() {
        let schema = sample_schema().with_column("O3", ColumnKind::Numeric);
        let err = RecordSet::new(sample_frame(), schema).unwrap_err();
        assert!(matches!(err, AnalysisError::ColumnNotFound(c) if c == "O3"));
    }

    #[test]
    fn test_new_invalid_timestamp() {
        let frame = df![
            "datetime" => ["2013-03-01 00:00:00", "yesterday"],
            "PM2.5" => [1.0, 2.0],
        ]
        .unwrap();
        let schema = Schema::new("datetime").with_column("PM2.5", ColumnKind::Numeric);
        let err = RecordSet::new(frame, schema).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TIMESTAMP");
    }

    #[test]
    fn test_numeric_values_rejects_categorical() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();
        let err = records.numeric_values("wd").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_COLUMN_TYPE");
    }

    #[test]
    fn test_numeric_values_nan_is_missing() {
        let frame = df![
            "datetime" => ["2013-03-01", "2013-03-02"],
            "x" => [f64::NAN, 2.0],
        ]
        .unwrap();
        let schema = Schema::new("datetime").with_column("x", ColumnKind::Numeric);
        let records = RecordSet::new(frame, schema).unwrap();
        assert_eq!(records.numeric_values("x").unwrap(), vec![None, Some(2.0)]);
    }

    #[test]
    fn test_column_series_are_named_and_typed() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();

        let pm = records.numeric_series("PM2.5").unwrap();
        assert_eq!(pm.name().as_str(), "PM2.5");
        assert_eq!(pm.dtype(), &DataType::Float64);
        assert_eq!(pm.null_count(), 1);

        let wd = records.categorical_series("wd").unwrap();
        assert_eq!(wd.dtype(), &DataType::String);
        assert!(records.categorical_series("PM2.5").is_err());
    }

    #[test]
    fn test_filter_station() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();

        let dongsi = records
            .filter_station(&StationFilter::station("Dongsi"))
            .unwrap();
        assert_eq!(dongsi.len(), 2);
        assert_eq!(dongsi.frame().height(), 2);
        assert_eq!(dongsi.numeric_values("PM2.5").unwrap(), vec![None, Some(30.0)]);

        let overall = records.filter_station(&StationFilter::Overall).unwrap();
        assert_eq!(overall.len(), 3);

        let err = records
            .filter_station(&StationFilter::station("Atlantis"))
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_STATION");
    }

    #[test]
    fn test_paging() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();
        assert_eq!(records.page_count(2), 2);
        assert_eq!(records.page(1, 2).unwrap().height(), 2);
        assert_eq!(records.page(2, 2).unwrap().height(), 1);
        assert!(records.page(0, 2).is_err());
        assert!(records.page(3, 2).is_err());
        assert!(records.page(1, 0).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2014, 7, 9)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp_str("2014-07-09 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp_str("2014-07-09 13:00"), Some(expected));
        assert_eq!(parse_timestamp_str("2014-07-09T13:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp_str("2014-07-09").unwrap().time(),
            chrono::NaiveTime::MIN
        );
        assert_eq!(parse_timestamp_str("09/07/2014"), None);
    }

    #[test]
    fn test_time_span() {
        let records = RecordSet::new(sample_frame(), sample_schema()).unwrap();
        let (first, last) = records.time_span().unwrap();
        assert_eq!(first, parse_timestamp_str("2013-03-01 00:00:00").unwrap());
        assert_eq!(last, parse_timestamp_str("2013-03-01 02:00:00").unwrap());
    }
}
