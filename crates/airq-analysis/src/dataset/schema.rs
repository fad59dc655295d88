//! Column typing and the fixed vocabulary of the air-quality dataset.

use crate::error::{AnalysisError, Result};
use crate::utils::{DtypeCategory, get_dtype_category};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Fixed Vocabulary
// =============================================================================

/// Name of the hourly timestamp column.
pub const TIMESTAMP_COLUMN: &str = "datetime";
/// Name of the station identifier column.
pub const STATION_COLUMN: &str = "station";
/// Wind direction column.
pub const WIND_COLUMN: &str = "wd";
/// Air-quality category column.
pub const CATEGORY_COLUMN: &str = "kategori";
/// Dominant pollutant column.
pub const POLLUTANT_COLUMN: &str = "polutan";
/// Value of [`POLLUTANT_COLUMN`] for hours without a dominant pollutant.
pub const CLEAN_POLLUTANT: &str = "clean";

/// Air-quality categories in severity order.
pub const CATEGORY_ORDER: [&str; 6] = [
    "Good",
    "Moderate",
    "Unhealthy for Sensitive Groups",
    "Unhealthy",
    "Very Unhealthy",
    "Hazardous",
];

/// Compass wind directions, clockwise from north.
pub const WIND_ORDER: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// The twelve monitoring stations.
pub const STATIONS: [&str; 12] = [
    "Aotizhongxin",
    "Changping",
    "Dingling",
    "Dongsi",
    "Guanyuan",
    "Gucheng",
    "Huairou",
    "Nongzhanguan",
    "Shunyi",
    "Tiantan",
    "Wanliu",
    "Wanshouxigong",
];

/// Pollutant concentrations followed by meteorological measurements.
pub const NUMERIC_COLUMNS: [&str; 11] = [
    "PM2.5", "PM10", "SO2", "NO2", "CO", "O3", "TEMP", "PRES", "DEWP", "RAIN", "WSPM",
];

/// Month-of-year labels, January first.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// =============================================================================
// Station Filter
// =============================================================================

/// Station selection applied to a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StationFilter {
    /// All stations.
    #[default]
    Overall,
    /// A single station.
    Station(String),
}

impl StationFilter {
    /// Select a single station.
    pub fn station(name: impl Into<String>) -> Self {
        StationFilter::Station(name.into())
    }

    /// Parse a user-facing selection; `"Overall"` (any case) means no filter.
    ///
    /// Station names are matched case-insensitively against [`STATIONS`] and
    /// normalized to their canonical spelling.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("overall") {
            return Ok(StationFilter::Overall);
        }
        STATIONS
            .iter()
            .find(|s| s.eq_ignore_ascii_case(trimmed))
            .map(|s| StationFilter::Station(s.to_string()))
            .ok_or_else(|| AnalysisError::UnknownStation(trimmed.to_string()))
    }

    /// Check that a single-station filter names one of [`STATIONS`].
    pub fn validate(&self) -> Result<()> {
        match self {
            StationFilter::Overall => Ok(()),
            StationFilter::Station(name) if STATIONS.contains(&name.as_str()) => Ok(()),
            StationFilter::Station(name) => Err(AnalysisError::UnknownStation(name.clone())),
        }
    }

    /// Display label ("Overall" or the station name).
    pub fn label(&self) -> &str {
        match self {
            StationFilter::Overall => "Overall",
            StationFilter::Station(name) => name,
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Semantic type of a column, decided once when the record set is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Human-readable name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

/// One analysed column and its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Column layout of a record set.
///
/// The timestamp and station columns are keys: they are not part of
/// [`Schema::columns`], but the station column is still addressable as a
/// categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    timestamp_column: String,
    station_column: Option<String>,
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Create an empty schema keyed by the given timestamp column.
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            station_column: None,
            columns: Vec::new(),
        }
    }

    /// Set the station key column.
    pub fn with_station_column(mut self, name: impl Into<String>) -> Self {
        self.station_column = Some(name.into());
        self
    }

    /// Append a column; a repeated name replaces the earlier kind.
    pub fn with_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        let name = name.into();
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == name) {
            existing.kind = kind;
        } else {
            self.columns.push(ColumnSpec { name, kind });
        }
        self
    }

    /// The fixed schema of the hourly air-quality dataset.
    pub fn air_quality() -> Self {
        let schema = NUMERIC_COLUMNS.iter().fold(
            Schema::new(TIMESTAMP_COLUMN).with_station_column(STATION_COLUMN),
            |schema, name| schema.with_column(*name, ColumnKind::Numeric),
        );
        [WIND_COLUMN, CATEGORY_COLUMN, POLLUTANT_COLUMN]
            .iter()
            .fold(schema, |schema, name| {
                schema.with_column(*name, ColumnKind::Categorical)
            })
    }

    /// Derive a schema from the polars dtypes of a frame.
    ///
    /// Numeric dtypes become [`ColumnKind::Numeric`], string, categorical and
    /// boolean dtypes become [`ColumnKind::Categorical`]; anything else is
    /// left out.
    pub fn infer(
        df: &DataFrame,
        timestamp_column: &str,
        station_column: Option<&str>,
    ) -> Result<Self> {
        if df.column(timestamp_column).is_err() {
            return Err(AnalysisError::ColumnNotFound(timestamp_column.to_string()));
        }

        let mut schema = Schema::new(timestamp_column);
        if let Some(station) = station_column {
            schema = schema.with_station_column(station);
        }

        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == timestamp_column || Some(name) == station_column {
                continue;
            }
            let kind = match get_dtype_category(column.dtype()) {
                DtypeCategory::Numeric => ColumnKind::Numeric,
                DtypeCategory::String | DtypeCategory::Boolean => ColumnKind::Categorical,
                DtypeCategory::Datetime | DtypeCategory::Other => continue,
            };
            schema = schema.with_column(name, kind);
        }

        Ok(schema)
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn station_column(&self) -> Option<&str> {
        self.station_column.as_deref()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Names of the numeric columns, in schema order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of(ColumnKind::Numeric)
    }

    /// Names of the categorical columns (station excluded), in schema order.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns_of(ColumnKind::Categorical)
    }

    fn columns_of(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Semantic type of a column.
    pub fn kind_of(&self, column: &str) -> Result<ColumnKind> {
        if self.station_column.as_deref() == Some(column) {
            return Ok(ColumnKind::Categorical);
        }
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.kind)
            .ok_or_else(|| AnalysisError::ColumnNotFound(column.to_string()))
    }

    /// Fail with [`AnalysisError::InvalidColumnType`] unless the column has
    /// the expected kind.
    pub fn require(&self, column: &str, expected: ColumnKind) -> Result<()> {
        if self.kind_of(column)? == expected {
            Ok(())
        } else {
            Err(AnalysisError::invalid_column_type(column, expected.as_str()))
        }
    }
}
