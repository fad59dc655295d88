//! CSV loading for the hourly dataset.
//!
//! Plain and gzip-compressed CSV are both accepted; polars detects the
//! compression from the file header.

use super::{RecordSet, STATION_COLUMN, Schema, TIMESTAMP_COLUMN};
use crate::error::{AnalysisError, Result, ResultExt};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Markers treated as missing values while reading.
const NULL_MARKERS: [&str; 3] = ["NA", "NaN", ""];

/// Load a CSV file into a frame.
///
/// The schema is first inferred from the leading rows; if that fails
/// (typically a numeric column whose first rows happen to be integers), the
/// whole file is scanned.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnalysisError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }

    match read_with_inference(path, Some(1000)) {
        Ok(df) => Ok(df),
        Err(e) => {
            debug!("Reading with partial schema inference failed: {}", e);
            read_with_inference(path, None).context(format!("Reading {}", path.display()))
        }
    }
}

fn read_with_inference(path: &Path, infer_rows: Option<usize>) -> PolarsResult<DataFrame> {
    let null_values = NullValues::AllColumns(NULL_MARKERS.iter().map(|s| (*s).into()).collect());

    CsvReadOptions::default()
        .with_infer_schema_length(infer_rows)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values)),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

/// Load the air-quality dataset and index it by time.
///
/// When every column of [`Schema::air_quality`] is present that schema is
/// used; otherwise the column types are inferred from the frame.
pub fn load_record_set(path: impl AsRef<Path>) -> Result<RecordSet> {
    let path = path.as_ref();
    info!("Loading dataset from: {}", path.display());
    let frame = read_csv(path)?;
    info!("Dataset loaded: {:?}", frame.shape());

    let schema = schema_for(&frame)?;
    RecordSet::new(frame, schema)
}

/// Pick the schema for a freshly loaded frame.
pub fn schema_for(frame: &DataFrame) -> Result<Schema> {
    let schema = Schema::air_quality();
    let missing: Vec<&str> = schema
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .chain(schema.station_column())
        .filter(|name| frame.column(name).is_err())
        .collect();

    if missing.is_empty() {
        return Ok(schema);
    }

    warn!("Dataset lacks {:?}; inferring column types from the file instead", missing);
    let station = frame.column(STATION_COLUMN).ok().map(|_| STATION_COLUMN);
    Schema::infer(frame, TIMESTAMP_COLUMN, station)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;

    #[test]
    fn test_schema_for_partial_frame_infers() {
        let frame = df![
            "datetime" => ["2013-03-01 00:00:00"],
            "PM2.5" => [3.0],
            "wd" => ["N"],
        ]
        .unwrap();
        let schema = schema_for(&frame).unwrap();
        assert_eq!(schema.kind_of("PM2.5").unwrap(), ColumnKind::Numeric);
        assert_eq!(schema.kind_of("wd").unwrap(), ColumnKind::Categorical);
        assert!(schema.station_column().is_none());
    }

    #[test]
    fn test_read_csv_missing_file() {
        let err = read_csv("does/not/exist.csv").unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
