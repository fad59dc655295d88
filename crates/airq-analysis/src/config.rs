//! Configuration types for the analysis engine.
//!
//! This module provides configuration options using the builder pattern.
//! Every field has a default matching the dashboard's fixed vocabulary and
//! view sizes, so `AnalysisConfig::default()` is the usual starting point.

use crate::dataset::{CATEGORY_ORDER, StationFilter, WIND_ORDER};
use serde::{Deserialize, Serialize};

/// Configuration for a dashboard computation pass.
///
/// Use [`AnalysisConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use airq_analysis::{AnalysisConfig, StationFilter};
///
/// let config = AnalysisConfig::builder()
///     .station(StationFilter::station("Changping"))
///     .significance_level(0.01)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Significance level for the chi-square tests and residual cut-offs.
    /// Default: 0.05
    pub significance_level: f64,

    /// Row ordering of the category/wind-direction contingency table.
    /// Default: the six air-quality levels in severity order.
    pub category_order: Vec<String>,

    /// Column ordering of the category/wind-direction contingency table.
    /// Default: 16 compass points clockwise from N.
    pub wind_order: Vec<String>,

    /// Station selection applied before any table is derived.
    /// Default: Overall (no filter)
    pub station: StationFilter,

    /// Rows per page of the raw data view.
    /// Default: 720 (roughly one month of hourly rows)
    pub rows_per_page: usize,

    /// Number of bins of numeric distribution histograms.
    /// Default: 64
    pub histogram_bins: usize,

    /// Divisor applied to monthly category counts.
    /// If None, the number of years spanned by the data is used.
    /// Default: None
    pub years_divisor: Option<u32>,

    /// Numeric columns of the correlation matrix.
    /// If None, every numeric column of the schema is used.
    /// Default: None
    pub correlation_columns: Option<Vec<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            category_order: owned(&CATEGORY_ORDER),
            wind_order: owned(&WIND_ORDER),
            station: StationFilter::Overall,
            rows_per_page: 720,
            histogram_bins: 64,
            years_divisor: None,
            correlation_columns: None,
        }
    }
}

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ConfigValidationError::InvalidSignificanceLevel(
                self.significance_level,
            ));
        }

        if self.rows_per_page == 0 {
            return Err(ConfigValidationError::ZeroValue("rows_per_page".to_string()));
        }

        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::ZeroValue("histogram_bins".to_string()));
        }

        if self.years_divisor == Some(0) {
            return Err(ConfigValidationError::ZeroValue("years_divisor".to_string()));
        }

        for (field, order) in [
            ("category_order", &self.category_order),
            ("wind_order", &self.wind_order),
        ] {
            if order.is_empty() {
                return Err(ConfigValidationError::EmptyOrdering(field.to_string()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid significance level: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidSignificanceLevel(f64),

    #[error("Invalid value for '{0}': must be at least 1")]
    ZeroValue(String),

    #[error("Ordering '{0}' must contain at least one label")]
    EmptyOrdering(String),
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    significance_level: Option<f64>,
    category_order: Option<Vec<String>>,
    wind_order: Option<Vec<String>>,
    station: Option<StationFilter>,
    rows_per_page: Option<usize>,
    histogram_bins: Option<usize>,
    years_divisor: Option<u32>,
    correlation_columns: Option<Vec<String>>,
}

impl AnalysisConfigBuilder {
    /// Set the significance level (alpha) of the association tests.
    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = Some(alpha);
        self
    }

    /// Override the row ordering of the category/wind table.
    pub fn category_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Override the column ordering of the category/wind table.
    pub fn wind_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wind_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict every derived table to one station.
    pub fn station(mut self, station: StationFilter) -> Self {
        self.station = Some(station);
        self
    }

    /// Set the page size of the raw data view.
    pub fn rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = Some(rows);
        self
    }

    /// Set the bin count of numeric histograms.
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Fix the divisor of monthly category counts instead of deriving it.
    pub fn years_divisor(mut self, years: u32) -> Self {
        self.years_divisor = Some(years);
        self
    }

    /// Restrict the correlation matrix to the given numeric columns.
    pub fn correlation_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correlation_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            significance_level: self
                .significance_level
                .unwrap_or(defaults.significance_level),
            category_order: self.category_order.unwrap_or(defaults.category_order),
            wind_order: self.wind_order.unwrap_or(defaults.wind_order),
            station: self.station.unwrap_or(defaults.station),
            rows_per_page: self.rows_per_page.unwrap_or(defaults.rows_per_page),
            histogram_bins: self.histogram_bins.unwrap_or(defaults.histogram_bins),
            years_divisor: self.years_divisor,
            correlation_columns: self.correlation_columns,
        };

        config.validate()?;
        Ok(config)
    }
}
