//! Time-based aggregation of a record set.
//!
//! - Median resampling of numeric columns into daily, monthly or yearly
//!   buckets
//! - Month-of-year category counts averaged over the years covered, and the
//!   association test run on them

mod monthly;
mod resample;

pub use monthly::{MonthlyAssociation, monthly_association, monthly_category_counts, years_spanned};
pub use resample::{Granularity, ResampledSeries, YEAR_WINDOW_DAYS, resample};
