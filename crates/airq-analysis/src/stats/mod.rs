//! Univariate and pairwise statistics.
//!
//! - Summary statistics per column (quartiles, mean, variance / mode)
//! - Frequency tables and histograms backing the distribution views
//! - Pearson correlation matrix over numeric columns

mod correlation;
mod descriptive;

pub use correlation::{CorrelationMatrix, correlate, correlation_matrix, pearson};
pub use descriptive::{
    CategoricalSummary, ColumnSummary, Histogram, NumericSummary, ValueCount, build_histogram,
    count_values, describe, describe_all, describe_categorical, describe_numeric, histogram,
    summarize_categorical, summarize_numeric, value_counts,
};
