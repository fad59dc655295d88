//! Air Quality Analysis Library
//!
//! The statistical engine behind an exploratory dashboard for hourly
//! air-quality measurements from twelve monitoring stations, built with Rust
//! and Polars.
//!
//! # Overview
//!
//! This library derives the dashboard's tables from a time-indexed record set:
//!
//! - **Descriptive Statistics**: quartiles, mean, variance and modes per column,
//!   plus frequency tables and histograms
//! - **Correlation**: pairwise-complete Pearson matrix over numeric columns
//! - **Association**: contingency tables over fixed category orderings, the
//!   chi-square test of independence and rescaled adjusted residuals
//! - **Temporal Aggregation**: median resampling by day, month or 366-day
//!   window, and month-of-year category counts
//! - **Bulkheaded Reporting**: every table computed independently, failures
//!   reported per table
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use airq_analysis::dataset::loader::load_record_set;
//! use airq_analysis::{AnalysisConfig, DashboardReport, DashboardRequest, StationFilter};
//!
//! let records = load_record_set("data/air_quality.csv")?;
//!
//! let config = AnalysisConfig::builder()
//!     .station(StationFilter::station("Changping"))
//!     .build()?;
//!
//! let report = DashboardReport::build(&records, &config, &DashboardRequest::default())?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```
//!
//! # Association Tests
//!
//! The building blocks are usable on their own:
//!
//! ```rust,ignore
//! use airq_analysis::association::*;
//! use airq_analysis::dataset::{CATEGORY_ORDER, WIND_ORDER};
//!
//! let table = ContingencyTable::crosstab(&records, "kategori", "wd", &CATEGORY_ORDER, &WIND_ORDER)?;
//! let observed = table.to_matrix();
//! let test = chi_square_test(&observed)?;
//! let z = standardized_adjusted_residuals(&observed, &test.expected)?;
//!
//! for cell in significant_cells(&z, z_critical(0.05)) {
//!     println!("{} / {}: {:+.2}", cell.row, cell.col, cell.z);
//! }
//! ```
//!
//! Degenerate tables (a zero expected frequency, identical residuals) are
//! reported as [`AnalysisError::DegenerateTable`] or
//! [`AnalysisError::ZeroPooledVariance`], never as NaN.

pub mod association;
pub mod config;
pub mod dataset;
pub mod error;
pub mod reporting;
pub mod stats;
pub mod temporal;
pub mod utils;

// Re-exports for convenient access
pub use association::{
    ChiSquareResult, ContingencyTable, LabeledMatrix, SignificantCell, chi_square_test,
    expected_frequencies, significant_cells, standardized_adjusted_residuals, z_critical,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError};
pub use dataset::{ColumnKind, RecordSet, Schema, StationFilter};
pub use error::{AnalysisError, Result as AnalysisResult, ResultExt};
pub use reporting::{DashboardReport, DashboardRequest, TableOutcome};
pub use stats::{
    CategoricalSummary, ColumnSummary, CorrelationMatrix, Histogram, NumericSummary, ValueCount,
    correlation_matrix, describe, describe_all,
};
pub use temporal::{Granularity, ResampledSeries, monthly_category_counts, resample};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype};
