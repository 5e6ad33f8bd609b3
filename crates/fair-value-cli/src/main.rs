mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::history::TrendArgs;
use commands::metrics::MetricArgs;
use commands::valuation::{AggregateArgs, CompsArgs, DcfArgs, SensitivityArgs};

/// Confidence-weighted fair-value estimates for private businesses
#[derive(Parser)]
#[command(
    name = "fve",
    version,
    about = "Confidence-weighted fair-value estimates for private businesses",
    long_about = "A CLI for reconciling business valuation methods with decimal precision. \
                  Supports weighted reconciliation, comparable company analysis, \
                  decaying-growth DCF, WACC x terminal growth sensitivity, benchmark \
                  metrics and valuation trend tracking."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile valuation methods into a confidence-weighted fair value
    Aggregate(AggregateArgs),
    /// Compare a reconciled value against peer multiples
    Comps(CompsArgs),
    /// Run a decaying-growth Discounted Cash Flow projection
    Dcf(DcfArgs),
    /// WACC x terminal growth sensitivity grid
    Sensitivity(SensitivityArgs),
    /// Evaluate metrics against industry benchmarks
    Metric(MetricArgs),
    /// Trend of the two most recent recorded valuations
    Trend(TrendArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Aggregate(args) => commands::valuation::run_aggregate(args),
        Commands::Comps(args) => commands::valuation::run_comps(args),
        Commands::Dcf(args) => commands::valuation::run_dcf(args),
        Commands::Sensitivity(args) => commands::valuation::run_sensitivity(args),
        Commands::Metric(args) => commands::metrics::run_metric(args),
        Commands::Trend(args) => commands::history::run_trend(args),
        Commands::Version => {
            println!("fve {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
