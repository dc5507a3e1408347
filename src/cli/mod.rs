//! Command-line parsing for the DEX execution-cost pipeline.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fetch/analysis code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::TradeSource;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dexcost", version, about = "DEX vs. reference-venue execution cost comparison")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch DEX trades for the configured pair/range into per-source CSVs.
    Fetch(StageArgs),
    /// Aggregate cost deviation by trade size from previously fetched files.
    Analyze(StageArgs),
    /// Analyze, then render the cost-vs-size chart.
    Plot(StageArgs),
    /// Full pipeline: fetch every configured source, analyze, plot.
    ///
    /// Stages run in fixed order and the run stops at the first failure,
    /// naming the stage that failed.
    Run(StageArgs),
}

/// Common options shared by every stage.
///
/// Every option has a default, so each stage can be invoked with no
/// arguments at all.
#[derive(Debug, Parser, Clone)]
pub struct StageArgs {
    /// Base asset symbol (trade sizes and buckets are in this unit).
    #[arg(long, default_value = "WETH")]
    pub base: String,

    /// Quote asset symbol (prices are quote-per-base).
    #[arg(long, default_value = "USDT")]
    pub quote: String,

    /// Range start (YYYY-MM-DD or RFC 3339, UTC).
    #[arg(long, default_value = "2024-01-01")]
    pub start: String,

    /// Range end, inclusive (YYYY-MM-DD or RFC 3339, UTC).
    #[arg(long, default_value = "2024-01-02")]
    pub end: String,

    /// Sources to fetch/aggregate (repeatable; defaults to all three).
    #[arg(long = "source", value_enum)]
    pub sources: Vec<TradeSource>,

    /// Ascending size-bucket edges in base-asset units (comma-separated).
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0]
    )]
    pub buckets: Vec<f64>,

    /// Mid-price resample interval in seconds.
    #[arg(long, default_value_t = 60)]
    pub resample_secs: u64,

    /// Hide chart buckets with fewer samples than this.
    #[arg(long, default_value_t = 1)]
    pub min_samples: usize,

    /// Directory holding the per-source trade CSVs.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Reference mid-price snapshot (CSV with `timestamp` in unix ms and
    /// `mid_price` columns). Defaults to `<data-dir>/reference_<BASE>_<QUOTE>.csv`.
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Output image path.
    #[arg(long, default_value = "results/average_costs.png")]
    pub out: PathBuf,

    /// Export the aggregated table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Rows per subgraph page.
    #[arg(long, default_value_t = 1000)]
    pub page_size: usize,

    /// Delay between subgraph pages, in milliseconds.
    #[arg(long, default_value_t = 200)]
    pub page_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}
