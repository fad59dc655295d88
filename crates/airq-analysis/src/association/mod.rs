//! Categorical association engine.
//!
//! This module provides:
//! - Contingency tables over fixed category orderings
//! - The Pearson chi-square test of independence
//! - Standardized adjusted residuals rescaled to a common z-score scale
//!
//! ```rust,ignore
//! let table = ContingencyTable::crosstab(&records, "kategori", "wd", &CATEGORY_ORDER, &WIND_ORDER)?;
//! let observed = table.to_matrix();
//! let test = chi_square_test(&observed)?;
//! let z = standardized_adjusted_residuals(&observed, &test.expected)?;
//! let notable = significant_cells(&z, z_critical(0.05));
//! ```

mod chi_square;
mod contingency;
mod matrix;
mod residuals;

pub use chi_square::{ChiSquareResult, chi_square_test, expected_frequencies};
pub use contingency::ContingencyTable;
pub use matrix::LabeledMatrix;
pub use residuals::{
    SignificantCell, significant_cells, standardized_adjusted_residuals, z_critical,
};
