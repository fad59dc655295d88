//! Dashboard assembly.
//!
//! [`DashboardReport`] gathers every derived table of the air-quality
//! dashboard for one station selection. Tables are computed independently:
//! a degenerate contingency table or an invalid column request shows up as a
//! [`TableOutcome::Failed`] entry while the rest of the report is still
//! filled in.
//!
//! # Example
//!
//! ```rust,ignore
//! use airq_analysis::reporting::{DashboardReport, DashboardRequest};
//!
//! let report = DashboardReport::build(&records, &config, &DashboardRequest::default())?;
//!
//! // Print as JSON
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! for (table, code) in report.failed_tables() {
//!     eprintln!("{} unavailable ({})", table, code);
//! }
//! ```

mod dashboard;

pub use dashboard::{
    ChiSquareSummary, DashboardReport, DashboardRequest, MonthlyAssociationSummary, PageView,
    ResidualSummary, TableOutcome,
};
