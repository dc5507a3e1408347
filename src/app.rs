//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the run configuration
//! - dispatches fetch/analyze/plot/run
//! - prints reports and writes exports

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use crate::cli::{Command, StageArgs};
use crate::domain::{DateRange, RunConfig, SizeBuckets, TradeSource, TradingPair};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `dexcost` binary.
pub fn run() -> Result<(), AppError> {
    // We want a bare `dexcost` to behave like `dexcost run`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of
    // the argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Analyze(args) => handle_analyze(args),
        Command::Plot(args) => handle_plot(args),
        Command::Run(args) => handle_run(args),
    }
}

fn handle_fetch(args: StageArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let client = crate::data::SubgraphClient::from_env(&config)?;

    for &source in &config.sources {
        let count = pipeline::fetch_source_to_file(&client, source, &config)?;
        println!(
            "{}",
            crate::report::format_fetch_summary(source, count, &config.trades_path(source))
        );
    }
    Ok(())
}

fn handle_analyze(args: StageArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_analysis(&config)?;

    print!("{}", crate::report::format_analysis_summary(&run, &config));
    print!("{}", crate::report::format_aggregate_table(&run.table, &config.buckets));

    if let Some(path) = &config.export_path {
        crate::io::export::write_aggregate_csv(path, &run.table, &config.buckets)?;
        println!("Aggregated table exported to {}", path.display());
    }
    Ok(())
}

fn handle_plot(args: StageArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_analysis(&config)?;

    crate::plot::render_cost_chart(&config.out_path, &run.table, &config)?;
    println!("Chart saved to {}", config.out_path.display());
    Ok(())
}

fn handle_run(args: StageArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    pipeline::run_all(&config)
}

/// Resolve a full [`RunConfig`] from CLI arguments.
pub fn run_config_from_args(args: &StageArgs) -> Result<RunConfig, AppError> {
    let pair = TradingPair::new(&args.base, &args.quote);
    let range = DateRange::new(parse_utc(&args.start)?, parse_utc(&args.end)?)?;
    let buckets = SizeBuckets::new(args.buckets.clone())?;

    let mut sources: Vec<TradeSource> = Vec::new();
    for &s in &args.sources {
        if !sources.contains(&s) {
            sources.push(s);
        }
    }
    if sources.is_empty() {
        sources = TradeSource::ALL.to_vec();
    }

    let reference_path = args.reference.clone().unwrap_or_else(|| {
        args.data_dir
            .join(format!("reference_{}_{}.csv", pair.base, pair.quote))
    });

    Ok(RunConfig {
        pair,
        range,
        buckets,
        resample: std::time::Duration::from_secs(args.resample_secs),
        min_samples: args.min_samples,
        sources,
        data_dir: args.data_dir.clone(),
        reference_path,
        out_path: args.out.clone(),
        export_path: args.export.clone(),
        page_size: args.page_size,
        page_delay: std::time::Duration::from_millis(args.page_delay_ms),
        timeout: std::time::Duration::from_secs(args.timeout_secs),
    })
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_utc(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::new(
                2,
                format!("Invalid date '{raw}'. Expected YYYY-MM-DD or RFC 3339."),
            )
        })
}

/// Rewrite argv so `dexcost` defaults to `dexcost run`.
///
/// Rules:
/// - `dexcost`                     -> `dexcost run`
/// - `dexcost --source ... `       -> `dexcost run --source ...`
/// - `dexcost --help/--version/-h` -> unchanged (top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version =
        matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fetch" | "analyze" | "plot" | "run");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> StageArgs {
        StageArgs::parse_from(["dexcost"])
    }

    #[test]
    fn dates_parse_as_day_or_rfc3339() {
        let midnight = parse_utc("2024-01-01").unwrap();
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let precise = parse_utc("2024-01-01T12:30:00Z").unwrap();
        assert_eq!(precise, Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap());

        assert!(parse_utc("01/02/2024").is_err());
    }

    #[test]
    fn default_config_covers_all_sources() {
        let config = run_config_from_args(&args()).unwrap();
        assert_eq!(config.sources, TradeSource::ALL.to_vec());
        assert_eq!(config.pair.label(), "WETH/USDT");
        assert_eq!(
            config.reference_path,
            std::path::PathBuf::from("data/reference_WETH_USDT.csv")
        );
    }

    #[test]
    fn duplicate_source_flags_collapse() {
        let mut a = args();
        a.sources = vec![TradeSource::Cowswap, TradeSource::Cowswap, TradeSource::UniswapV2];
        let config = run_config_from_args(&a).unwrap();
        assert_eq!(config.sources, vec![TradeSource::Cowswap, TradeSource::UniswapV2]);
    }

    #[test]
    fn bare_invocation_defaults_to_run() {
        let rewritten = rewrite_args(vec!["dexcost".to_string()]);
        assert_eq!(rewritten, vec!["dexcost", "run"]);

        let rewritten = rewrite_args(vec!["dexcost".to_string(), "--min-samples".to_string()]);
        assert_eq!(rewritten[1], "run");

        let untouched = rewrite_args(vec!["dexcost".to_string(), "analyze".to_string()]);
        assert_eq!(untouched, vec!["dexcost", "analyze"]);

        let help = rewrite_args(vec!["dexcost".to_string(), "--help".to_string()]);
        assert_eq!(help, vec!["dexcost", "--help"]);
    }
}
