//! The dashboard report: every derived table of one station view.
//!
//! Each table is computed on its own and stored as a [`TableOutcome`], so a
//! degenerate contingency table or a bad page request fails only that table.

use crate::association::{
    ChiSquareResult, ContingencyTable, LabeledMatrix, SignificantCell, chi_square_test,
    significant_cells, standardized_adjusted_residuals, z_critical,
};
use crate::config::AnalysisConfig;
use crate::dataset::{CATEGORY_COLUMN, CLEAN_POLLUTANT, POLLUTANT_COLUMN, RecordSet, WIND_COLUMN};
use crate::error::{AnalysisError, Result};
use crate::stats::{
    ColumnSummary, CorrelationMatrix, Histogram, ValueCount, correlation_matrix, describe_all,
    histogram, value_counts,
};
use crate::temporal::{
    Granularity, MonthlyAssociation, ResampledSeries, monthly_association,
    monthly_category_counts, resample,
};
use chrono::{Local, NaiveDateTime};
use polars::prelude::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// ============================================================================
// Table Outcome
// ============================================================================

/// A derived table, or the error that prevented computing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "table", rename_all = "snake_case")]
pub enum TableOutcome<T> {
    Ready(T),
    Failed { code: String, message: String },
}

impl<T> TableOutcome<T> {
    /// Wrap a computation result, logging a failure under `name`.
    pub fn from_result(name: &str, result: Result<T>) -> Self {
        match result {
            Ok(table) => {
                debug!("Table '{}' ready", name);
                TableOutcome::Ready(table)
            }
            Err(e) => {
                warn!("Table '{}' failed: {}", name, e);
                TableOutcome::Failed {
                    code: e.error_code().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TableOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            TableOutcome::Ready(table) => Some(table),
            TableOutcome::Failed { .. } => None,
        }
    }

    /// Derive a table from this one. A failure is carried over unchanged,
    /// so a dependent table reports the code of the table it needed.
    pub fn and_then<U>(&self, name: &str, derive: impl FnOnce(&T) -> Result<U>) -> TableOutcome<U> {
        match self {
            TableOutcome::Ready(table) => TableOutcome::from_result(name, derive(table)),
            TableOutcome::Failed { code, message } => {
                warn!("Table '{}' skipped: {}", name, message);
                TableOutcome::Failed {
                    code: code.clone(),
                    message: message.clone(),
                }
            }
        }
    }

    /// Error code of a failed table.
    pub fn failure_code(&self) -> Option<&str> {
        match self {
            TableOutcome::Ready(_) => None,
            TableOutcome::Failed { code, .. } => Some(code),
        }
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// View-level choices that are not part of the analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardRequest {
    /// Bucket width of the resampled trend series.
    pub granularity: Granularity,
    /// Numeric columns of the resampled trend series.
    pub resample_columns: Vec<String>,
    /// 1-based page of the raw data view.
    pub page: usize,
}

impl Default for DashboardRequest {
    fn default() -> Self {
        Self {
            granularity: Granularity::Daily,
            resample_columns: vec!["PM2.5".to_string(), "PM10".to_string()],
            page: 1,
        }
    }
}

/// Chi-square test together with its decision at the configured level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareSummary {
    pub test: ChiSquareResult,
    pub significance_level: f64,
    /// Chi-square quantile at `1 - significance_level`; `None` for zero
    /// degrees of freedom.
    pub critical_value: Option<f64>,
    pub rejects_independence: bool,
}

impl ChiSquareSummary {
    fn new(test: ChiSquareResult, alpha: f64) -> Self {
        Self {
            critical_value: test.critical_value(alpha),
            rejects_independence: test.rejects_independence(alpha),
            significance_level: alpha,
            test,
        }
    }
}

/// Rescaled residuals with the cells beyond the two-sided critical z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub residuals: LabeledMatrix,
    pub z_critical: f64,
    pub significant_cells: Vec<SignificantCell>,
}

impl ResidualSummary {
    fn new(residuals: LabeledMatrix, alpha: f64) -> Self {
        let critical = z_critical(alpha);
        Self {
            significant_cells: significant_cells(&residuals, critical),
            z_critical: critical,
            residuals,
        }
    }
}

/// Monthly category association with its decision and notable cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAssociationSummary {
    pub association: MonthlyAssociation,
    pub chi_square: ChiSquareSummary,
    pub residuals: ResidualSummary,
}

/// One page of raw rows, every value rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub page: usize,
    pub page_count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Every derived table of the dashboard for one station selection.
///
/// Each table is computed independently; a failure is recorded in its own
/// [`TableOutcome`] and never prevents the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub generated_at: String,
    pub station: String,
    pub row_count: usize,
    pub time_span: Option<(NaiveDateTime, NaiveDateTime)>,

    pub summaries: TableOutcome<Vec<ColumnSummary>>,
    pub value_counts: TableOutcome<BTreeMap<String, Vec<ValueCount>>>,
    pub histograms: TableOutcome<Vec<Histogram>>,
    pub correlation: TableOutcome<CorrelationMatrix>,

    pub wind_contingency: TableOutcome<ContingencyTable>,
    pub wind_chi_square: TableOutcome<ChiSquareSummary>,
    pub wind_residuals: TableOutcome<ResidualSummary>,

    pub resampled: TableOutcome<ResampledSeries>,
    pub monthly_categories: TableOutcome<LabeledMatrix>,
    pub monthly_pollutants: TableOutcome<LabeledMatrix>,
    pub monthly_association: TableOutcome<MonthlyAssociationSummary>,

    pub page: TableOutcome<PageView>,
}

impl DashboardReport {
    /// Compute the dashboard for `records` under `config`.
    ///
    /// Fails only when the configuration is invalid or the station filter
    /// cannot be applied; every table failure after that is bulkheaded.
    pub fn build(
        records: &RecordSet,
        config: &AnalysisConfig,
        request: &DashboardRequest,
    ) -> Result<Self> {
        config.validate()?;
        let records = records.filter_station(&config.station)?;
        let alpha = config.significance_level;

        info!(
            "Building dashboard for {} ({} rows)",
            config.station.label(),
            records.len()
        );

        let wind_contingency = TableOutcome::from_result(
            "wind_contingency",
            ContingencyTable::crosstab(
                &records,
                CATEGORY_COLUMN,
                WIND_COLUMN,
                config.category_order.as_slice(),
                config.wind_order.as_slice(),
            ),
        );
        let wind_chi_square = wind_contingency.and_then("wind_chi_square", |table| {
            chi_square_test(&table.to_matrix()).map(|test| ChiSquareSummary::new(test, alpha))
        });
        let wind_residuals = wind_chi_square.and_then("wind_residuals", |chi_square| {
            let table = dependent(&wind_contingency, "wind_contingency")?;
            standardized_adjusted_residuals(&table.to_matrix(), &chi_square.test.expected)
                .map(|residuals| ResidualSummary::new(residuals, alpha))
        });

        let report = Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            station: config.station.label().to_string(),
            row_count: records.len(),
            time_span: records.time_span(),

            summaries: TableOutcome::from_result("summaries", describe_all(&records)),
            value_counts: TableOutcome::from_result("value_counts", all_value_counts(&records)),
            histograms: TableOutcome::from_result(
                "histograms",
                all_histograms(&records, config.histogram_bins),
            ),
            correlation: TableOutcome::from_result(
                "correlation",
                correlation_matrix(&records, config.correlation_columns.as_deref()),
            ),

            wind_contingency,
            wind_chi_square,
            wind_residuals,

            resampled: TableOutcome::from_result(
                "resampled",
                resample(&records, request.granularity, request.resample_columns.as_slice()),
            ),
            monthly_categories: TableOutcome::from_result(
                "monthly_categories",
                monthly_category_counts(
                    &records,
                    CATEGORY_COLUMN,
                    Some(config.category_order.as_slice()),
                    config.years_divisor,
                ),
            ),
            monthly_pollutants: TableOutcome::from_result(
                "monthly_pollutants",
                monthly_category_counts::<&str>(
                    &records,
                    POLLUTANT_COLUMN,
                    None,
                    config.years_divisor,
                )
                .map(|m| m.without_row(CLEAN_POLLUTANT)),
            ),
            monthly_association: TableOutcome::from_result(
                "monthly_association",
                monthly_association(&records, config).map(|association| {
                    MonthlyAssociationSummary {
                        chi_square: ChiSquareSummary::new(association.test.clone(), alpha),
                        residuals: ResidualSummary::new(association.residuals.clone(), alpha),
                        association,
                    }
                }),
            ),

            page: TableOutcome::from_result(
                "page",
                page_view(&records, request.page, config.rows_per_page),
            ),
        };

        let failed = report.failed_tables();
        if failed.is_empty() {
            info!("Dashboard complete");
        } else {
            warn!("Dashboard complete with {} failed tables", failed.len());
        }
        Ok(report)
    }

    /// Names and error codes of the tables that failed.
    pub fn failed_tables(&self) -> Vec<(&'static str, &str)> {
        [
            ("summaries", self.summaries.failure_code()),
            ("value_counts", self.value_counts.failure_code()),
            ("histograms", self.histograms.failure_code()),
            ("correlation", self.correlation.failure_code()),
            ("wind_contingency", self.wind_contingency.failure_code()),
            ("wind_chi_square", self.wind_chi_square.failure_code()),
            ("wind_residuals", self.wind_residuals.failure_code()),
            ("resampled", self.resampled.failure_code()),
            ("monthly_categories", self.monthly_categories.failure_code()),
            ("monthly_pollutants", self.monthly_pollutants.failure_code()),
            ("monthly_association", self.monthly_association.failure_code()),
            ("page", self.page.failure_code()),
        ]
        .into_iter()
        .filter_map(|(name, code)| Some((name, code?)))
        .collect()
    }
}

// ============================================================================
// Table Builders
// ============================================================================

/// The upstream table, or an error naming it when it failed.
fn dependent<'a, T>(outcome: &'a TableOutcome<T>, name: &str) -> Result<&'a T> {
    match outcome {
        TableOutcome::Ready(table) => Ok(table),
        TableOutcome::Failed { code, .. } => Err(AnalysisError::InvalidInput(format!(
            "upstream table '{}' failed ({})",
            name, code
        ))),
    }
}

fn all_value_counts(records: &RecordSet) -> Result<BTreeMap<String, Vec<ValueCount>>> {
    records
        .schema()
        .categorical_columns()
        .into_iter()
        .map(|column| Ok((column.to_string(), value_counts(records, column)?)))
        .collect()
}

fn all_histograms(records: &RecordSet, bins: usize) -> Result<Vec<Histogram>> {
    records
        .schema()
        .numeric_columns()
        .into_iter()
        .map(|column| histogram(records, column, bins))
        .collect()
}

fn page_view(records: &RecordSet, page: usize, rows_per_page: usize) -> Result<PageView> {
    let frame = records.page(page, rows_per_page)?;
    let columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();

    let mut rendered = Vec::with_capacity(columns.len());
    for column in frame.get_columns() {
        let text = column.as_materialized_series().cast(&DataType::String)?;
        rendered.push(
            text.str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect::<Vec<_>>(),
        );
    }

    let rows = (0..frame.height())
        .map(|i| rendered.iter().map(|col| col[i].clone()).collect())
        .collect();

    Ok(PageView {
        page,
        page_count: records.page_count(rows_per_page),
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnKind, Schema, StationFilter};
    use polars::prelude::*;

    fn records() -> RecordSet {
        let frame = df![
            "datetime" => ["2013-03-01 00:00:00", "2013-03-02 00:00:00", "2013-03-03 00:00:00",
                           "2013-03-04 00:00:00", "2013-04-01 00:00:00", "2013-04-02 00:00:00",
                           "2013-04-03 00:00:00", "2013-04-04 00:00:00"],
            "station" => ["Dongsi", "Dongsi", "Dongsi", "Dongsi",
                          "Tiantan", "Tiantan", "Tiantan", "Tiantan"],
            "PM2.5" => [10.0, 20.0, 15.0, 160.0, 170.0, 180.0, 190.0, 30.0],
            "PM10" => [20.0, 35.0, 25.0, 200.0, 240.0, 260.0, 250.0, 45.0],
            "wd" => ["N", "N", "N", "N", "S", "S", "S", "S"],
            "kategori" => ["Good", "Good", "Good", "Unhealthy",
                           "Unhealthy", "Unhealthy", "Unhealthy", "Good"],
            "polutan" => ["clean", "PM2.5", "clean", "PM10", "PM2.5", "PM2.5", "PM10", "clean"],
        ]
        .unwrap();
        let schema = Schema::new("datetime")
            .with_station_column("station")
            .with_column("PM2.5", ColumnKind::Numeric)
            .with_column("PM10", ColumnKind::Numeric)
            .with_column("wd", ColumnKind::Categorical)
            .with_column("kategori", ColumnKind::Categorical)
            .with_column("polutan", ColumnKind::Categorical);
        RecordSet::new(frame, schema).unwrap()
    }

    fn two_level_config() -> AnalysisConfig {
        AnalysisConfig::builder()
            .category_order(["Good", "Unhealthy"])
            .wind_order(["N", "S"])
            .build()
            .unwrap()
    }

    // ==================== association tests ====================

    #[test]
    fn test_wind_association_tables() {
        let report =
            DashboardReport::build(&records(), &two_level_config(), &DashboardRequest::default())
                .unwrap();

        let table = report.wind_contingency.ready().unwrap();
        assert_eq!(table.counts, vec![vec![3, 1], vec![1, 3]]);

        let chi = report.wind_chi_square.ready().unwrap();
        assert_eq!(chi.test.degrees_of_freedom, 1);
        assert!((chi.test.statistic - 2.0).abs() < 1e-12);
        assert!(!chi.rejects_independence);

        let residuals = report.wind_residuals.ready().unwrap();
        assert!((residuals.residuals.values[0][0] - 1.0).abs() < 1e-9);
        assert!(residuals.significant_cells.is_empty());

        let monthly = report.monthly_association.ready().unwrap();
        assert_eq!(monthly.association.table.col_labels, vec!["Mar", "Apr"]);
        assert!(report.failed_tables().is_empty());
    }

    // ==================== bulkheading tests ====================

    #[test]
    fn test_degenerate_table_does_not_abort_report() {
        // The default ordering has four categories that never occur, so the
        // wind table has zero rows and zero expected frequencies.
        let report = DashboardReport::build(
            &records(),
            &AnalysisConfig::default(),
            &DashboardRequest::default(),
        )
        .unwrap();

        assert!(report.wind_contingency.is_ready());
        assert_eq!(report.wind_chi_square.failure_code(), Some("DEGENERATE_TABLE"));
        assert_eq!(report.wind_residuals.failure_code(), Some("DEGENERATE_TABLE"));

        assert!(report.summaries.is_ready());
        assert!(report.correlation.is_ready());
        assert!(report.resampled.is_ready());
        assert!(report.monthly_association.is_ready());

        let failed: Vec<&str> = report.failed_tables().iter().map(|(name, _)| *name).collect();
        assert_eq!(failed, vec!["wind_chi_square", "wind_residuals"]);
    }

    #[test]
    fn test_dependent_tables_carry_upstream_failure() {
        let frame = df![
            "datetime" => ["2013-03-01 00:00:00", "2013-03-02 00:00:00"],
            "PM2.5" => [10.0, 20.0],
            "wd" => ["N", "S"],
        ]
        .unwrap();
        let schema = Schema::new("datetime")
            .with_column("PM2.5", ColumnKind::Numeric)
            .with_column("wd", ColumnKind::Categorical);
        let rs = RecordSet::new(frame, schema).unwrap();
        let request = DashboardRequest {
            resample_columns: vec!["PM2.5".to_string()],
            ..DashboardRequest::default()
        };
        let report = DashboardReport::build(&rs, &AnalysisConfig::default(), &request).unwrap();

        assert_eq!(report.wind_contingency.failure_code(), Some("COLUMN_NOT_FOUND"));
        assert_eq!(report.wind_chi_square.failure_code(), Some("COLUMN_NOT_FOUND"));
        assert_eq!(report.wind_residuals.failure_code(), Some("COLUMN_NOT_FOUND"));
        assert!(report.summaries.is_ready());
        assert!(report.resampled.is_ready());
    }

    #[test]
    fn test_and_then_derives_or_carries_failure() {
        let ready: TableOutcome<u32> = TableOutcome::Ready(2);
        assert_eq!(ready.and_then("double", |v| Ok(v * 2)).ready(), Some(&4));

        let failed: TableOutcome<u32> = TableOutcome::from_result(
            "base",
            Err(AnalysisError::degenerate("zero expected frequency")),
        );
        let derived = failed.and_then("double", |v| Ok(v * 2));
        assert_eq!(derived.failure_code(), Some("DEGENERATE_TABLE"));
        assert_eq!(
            derived,
            TableOutcome::Failed {
                code: "DEGENERATE_TABLE".to_string(),
                message: "Degenerate table: zero expected frequency".to_string(),
            }
        );
    }

    #[test]
    fn test_bad_page_only_fails_page() {
        let request = DashboardRequest {
            page: 5,
            ..DashboardRequest::default()
        };
        let report = DashboardReport::build(&records(), &two_level_config(), &request).unwrap();
        assert_eq!(report.page.failure_code(), Some("INVALID_INPUT"));
        assert!(report.wind_chi_square.is_ready());
    }

    // ==================== station and view tests ====================

    #[test]
    fn test_station_filter_applies_to_every_table() {
        let config = AnalysisConfig::builder()
            .station(StationFilter::station("Dongsi"))
            .build()
            .unwrap();
        let report =
            DashboardReport::build(&records(), &config, &DashboardRequest::default()).unwrap();

        assert_eq!(report.station, "Dongsi");
        assert_eq!(report.row_count, 4);
        let page = report.page.ready().unwrap();
        assert_eq!(page.rows.len(), 4);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn test_unknown_station_fails_build() {
        let config = AnalysisConfig::builder()
            .station(StationFilter::station("Gotham"))
            .build()
            .unwrap();
        let err = DashboardReport::build(&records(), &config, &DashboardRequest::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_STATION");
    }

    #[test]
    fn test_pollutant_table_drops_clean() {
        let report =
            DashboardReport::build(&records(), &two_level_config(), &DashboardRequest::default())
                .unwrap();
        let pollutants = report.monthly_pollutants.ready().unwrap();
        assert_eq!(pollutants.row_labels, vec!["PM10", "PM2.5"]);
    }

    #[test]
    fn test_report_serializes_with_status_tags() {
        let report = DashboardReport::build(
            &records(),
            &AnalysisConfig::default(),
            &DashboardRequest::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["summaries"]["status"], "ready");
        assert_eq!(json["wind_chi_square"]["status"], "failed");
        assert_eq!(json["wind_chi_square"]["table"]["code"], "DEGENERATE_TABLE");
    }
}
