//! CLI entry point for the air-quality analysis engine.

use airq_analysis::dataset::loader::load_record_set;
use airq_analysis::reporting::{ChiSquareSummary, ResidualSummary};
use airq_analysis::{
    AnalysisConfig, DashboardReport, DashboardRequest, Granularity, StationFilter, TableOutcome,
};
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use tracing::info;

/// CLI-compatible resampling granularity enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGranularity {
    /// Calendar days
    Daily,
    /// Calendar months
    Monthly,
    /// 366-day windows from the first observation
    Yearly,
}

impl From<CliGranularity> for Granularity {
    fn from(cli: CliGranularity) -> Self {
        match cli {
            CliGranularity::Daily => Granularity::Daily,
            CliGranularity::Monthly => Granularity::Monthly,
            CliGranularity::Yearly => Granularity::Yearly,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Air-quality exploratory statistics",
    long_about = "Computes the statistical tables of the air-quality dashboard: summaries, \
                  correlations, chi-square association tests with adjusted residuals, and \
                  temporal aggregates.\n\n\
                  EXAMPLES:\n  \
                  # Whole dataset, human-readable summary\n  \
                  airq-analysis -i air_quality.csv\n\n  \
                  # One station, monthly trend, full JSON report\n  \
                  airq-analysis -i air_quality.csv.gz -s Changping --granularity monthly --json"
)]
struct Args {
    /// Path to the CSV file (plain or gzip-compressed)
    #[arg(short, long)]
    input: String,

    /// Station to analyse, or "Overall" for all stations
    #[arg(short, long, default_value = "Overall")]
    station: String,

    /// Significance level of the association tests
    #[arg(long, default_value = "0.05")]
    alpha: f64,

    /// Bucket width of the resampled trend series
    #[arg(long, value_enum, default_value = "daily")]
    granularity: CliGranularity,

    /// Numeric columns of the resampled trend series
    #[arg(long, value_delimiter = ',', default_value = "PM2.5,PM10")]
    columns: Vec<String>,

    /// Page of the raw data view (1-based)
    #[arg(long, default_value = "1")]
    page: usize,

    /// Output the full report as JSON to stdout instead of a summary
    ///
    /// Disables all logs; only the JSON report is written.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !std::path::Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = AnalysisConfig::builder()
        .station(StationFilter::parse(&args.station)?)
        .significance_level(args.alpha)
        .build()?;

    let request = DashboardRequest {
        granularity: args.granularity.into(),
        resample_columns: args.columns.clone(),
        page: args.page,
    };

    info!("Loading dataset from: {}", args.input);
    let records = load_record_set(&args.input)?;

    let report = DashboardReport::build(&records, &config, &request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&args, &report);
    }

    Ok(())
}

/// Print the human-readable summary.
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn print_summary(args: &Args, report: &DashboardReport) {
    println!("\n{}", "=".repeat(80));
    println!("AIR QUALITY ANALYSIS - {}", report.station);
    println!("{}\n", "=".repeat(80));

    println!("DATASET");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", report.row_count);
    if let Some((first, last)) = report.time_span {
        println!("  Span: {} .. {}", first, last);
    }
    println!();

    println!("CATEGORY vs WIND DIRECTION");
    println!("{}", "-".repeat(40));
    print_outcome("Chi-square", &report.wind_chi_square, print_chi_square);
    print_outcome("Residuals", &report.wind_residuals, print_residuals);
    println!();

    println!("CATEGORY vs MONTH");
    println!("{}", "-".repeat(40));
    print_outcome("Association", &report.monthly_association, |monthly| {
        print_chi_square(&monthly.chi_square);
        print_residuals(&monthly.residuals);
    });
    println!();

    println!("CORRELATION");
    println!("{}", "-".repeat(40));
    print_outcome("Correlation", &report.correlation, |matrix| {
        println!("  Columns: {}", matrix.columns.len());
        let undefined = matrix.undefined_pairs();
        if undefined.is_empty() {
            println!("  All correlations defined");
        } else {
            for (a, b) in undefined {
                println!("  Undefined: {} / {}", a, b);
            }
        }
    });
    println!();

    if let TableOutcome::Ready(series) = &report.resampled {
        println!("TREND ({})", series.granularity);
        println!("{}", "-".repeat(40));
        println!("  Buckets: {} over {}", series.len(), series.columns.join(", "));
        println!();
    }

    let failed = report.failed_tables();
    if !failed.is_empty() {
        println!("FAILED TABLES");
        println!("{}", "-".repeat(40));
        for (table, code) in failed {
            println!("  - {} [{}]", table, code);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!("Use --json for the full report");
    println!("{}", "=".repeat(80));
}

fn print_outcome<T>(label: &str, outcome: &TableOutcome<T>, print: impl Fn(&T)) {
    match outcome {
        TableOutcome::Ready(table) => print(table),
        TableOutcome::Failed { code, message } => {
            println!("  {} unavailable [{}]: {}", label, code, message);
        }
    }
}

fn print_chi_square(summary: &ChiSquareSummary) {
    println!("  Chi-square statistic: {:.4}", summary.test.statistic);
    println!("  Degrees of freedom:   {}", summary.test.degrees_of_freedom);
    println!("  P-value:              {:.4e}", summary.test.p_value);
    if let Some(critical) = summary.critical_value {
        println!("  Critical value:       {:.4}", critical);
    }
    println!(
        "  Independence {} at alpha = {}",
        if summary.rejects_independence {
            "rejected"
        } else {
            "not rejected"
        },
        summary.significance_level
    );
}

fn print_residuals(summary: &ResidualSummary) {
    println!(
        "  Significant cells (|z| > {:.2}): {}",
        summary.z_critical,
        summary.significant_cells.len()
    );
    for cell in &summary.significant_cells {
        println!("    {:<32} {:<6} {:+.2}", cell.row, cell.col, cell.z);
    }
}
