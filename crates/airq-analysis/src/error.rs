//! Error types for the air-quality analysis engine.
//!
//! Every derived-table computation returns [`Result`], so a failure in one
//! table (for example a degenerate contingency table) can be reported on its
//! own while the remaining tables are still produced.
//!
//! Errors are serializable as `{code, message}` so a presentation layer can
//! render them next to the table that failed.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the analysis engine.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Column was not found in the record set.
    #[error("Column '{0}' not found in record set")]
    ColumnNotFound(String),

    /// Column exists but carries the wrong semantic type for the request.
    #[error("Column '{column}' is not {expected}")]
    InvalidColumnType { column: String, expected: String },

    /// Invalid argument or malformed input table.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Two matrices that must share a shape do not.
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A contingency table that cannot be tested (zero expected frequency,
    /// non-positive residual variance term).
    #[error("Degenerate table: {reason}")]
    DegenerateTable { reason: String },

    /// All adjusted residuals are identical so they cannot be rescaled.
    #[error("Degenerate table: pooled standard deviation of residuals is zero")]
    ZeroPooledVariance,

    /// Station name outside the fixed set of monitoring stations.
    #[error("Unknown station '{0}'")]
    UnknownStation(String),

    /// Timestamp value could not be parsed.
    #[error("Invalid timestamp '{value}' in column '{column}'")]
    InvalidTimestamp { column: String, value: String },

    /// The record set has no rows.
    #[error("Record set is empty")]
    EmptyDataset,

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ConfigValidationError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalysisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for [`AnalysisError::InvalidColumnType`].
    pub fn invalid_column_type(column: impl Into<String>, expected: impl Into<String>) -> Self {
        AnalysisError::InvalidColumnType {
            column: column.into(),
            expected: expected.into(),
        }
    }

    /// Shorthand for [`AnalysisError::DegenerateTable`].
    pub fn degenerate(reason: impl Into<String>) -> Self {
        AnalysisError::DegenerateTable {
            reason: reason.into(),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidColumnType { .. } => "INVALID_COLUMN_TYPE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::DegenerateTable { .. } => "DEGENERATE_TABLE",
            Self::ZeroPooledVariance => "ZERO_POOLED_VARIANCE",
            Self::UnknownStation(_) => "UNKNOWN_STATION",
            Self::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error comes from a table that cannot be tested
    /// (zero expected frequency or zero pooled variance).
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::DegenerateTable { .. } | Self::ZeroPooledVariance => true,
            Self::WithContext { source, .. } => source.is_degenerate(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for AnalysisError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalysisError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Polars(e).with_context(context))
    }
}
