//! Shared analysis pipeline and the fixed-order driver.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! trade files -> reference join -> deviations -> aggregated table
//!
//! The CLI handlers then focus on presentation (printing vs. rendering).

use crate::analysis::{self, ReferenceSeries};
use crate::data::{self, SubgraphClient};
use crate::domain::{AggregateTable, RunConfig, TradeSource};
use crate::error::AppError;
use crate::io;
use crate::io::trades::RowError;

/// Per-source ingest accounting for the run summary.
#[derive(Debug, Clone)]
pub struct SourceIngest {
    pub source: TradeSource,
    pub rows_read: usize,
    pub rows_used: usize,
    pub row_errors: Vec<RowError>,
}

/// All computed outputs of one analyzer run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub table: AggregateTable,
    pub ingests: Vec<SourceIngest>,
    pub reference_points: usize,
    pub trades_joined: usize,
}

/// Execute the analyzer: load the flat files, join against the reference
/// series, aggregate by (source, size bucket).
pub fn run_analysis(config: &RunConfig) -> Result<AnalysisRun, AppError> {
    // 1) Reference snapshot, resampled to the configured interval.
    let points = io::reference::read_reference_csv(&config.reference_path)?;
    let reference = analysis::resample_mid_prices(&ReferenceSeries::new(points), config.resample);

    // 2) Per-source trade files.
    let mut deviations = Vec::new();
    let mut ingests = Vec::new();
    for &source in &config.sources {
        let path = config.trades_path(source);
        let file = io::trades::read_trades_csv(&path, source)?;

        let mut trades = file.trades;
        // Trades outside the configured range are dropped, not errored.
        trades.retain(|t| config.range.contains(t.timestamp));

        deviations.extend(analysis::compute_deviations(&trades, &reference)?);
        ingests.push(SourceIngest {
            source,
            rows_read: file.rows_read,
            rows_used: trades.len(),
            row_errors: file.row_errors,
        });
    }

    // 3) Aggregate.
    let trades_joined = deviations.len();
    let table = analysis::aggregate(&deviations, &config.buckets);

    Ok(AnalysisRun {
        table,
        ingests,
        reference_points: reference.len(),
        trades_joined,
    })
}

/// Fetch one source and overwrite its flat file. Returns the trade count.
pub fn fetch_source_to_file(
    client: &SubgraphClient,
    source: TradeSource,
    config: &RunConfig,
) -> Result<usize, AppError> {
    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        AppError::new(
            2,
            format!(
                "Failed to create data directory '{}': {e}",
                config.data_dir.display()
            ),
        )
    })?;

    let trades = data::fetch_source(client, source, config)?;
    io::trades::write_trades_csv(&config.trades_path(source), &trades)?;
    Ok(trades.len())
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch(TradeSource),
    Analyze,
    Plot,
}

impl Stage {
    pub fn display_name(self) -> String {
        match self {
            Stage::Fetch(source) => format!("fetch:{}", source.slug()),
            Stage::Analyze => "analyze".to_string(),
            Stage::Plot => "plot".to_string(),
        }
    }
}

/// Execute fetch -> analyze -> plot, stopping at the first failure and
/// naming the stage that failed. No partial chart is produced on failure;
/// a failed run is rerun from the failing stage.
pub fn run_all(config: &RunConfig) -> Result<(), AppError> {
    let Some(&first_source) = config.sources.first() else {
        return Err(AppError::new(2, "No sources configured."));
    };

    // Client construction failures (e.g. missing API key) count against the
    // first fetch stage.
    let client = SubgraphClient::from_env(config)
        .map_err(|e| stage_failure(Stage::Fetch(first_source), e))?;

    for &source in &config.sources {
        let stage = Stage::Fetch(source);
        let count =
            fetch_source_to_file(&client, source, config).map_err(|e| stage_failure(stage, e))?;
        println!(
            "{}",
            crate::report::format_fetch_summary(source, count, &config.trades_path(source))
        );
    }

    let run = run_analysis(config).map_err(|e| stage_failure(Stage::Analyze, e))?;
    print!("{}", crate::report::format_analysis_summary(&run, config));
    print!(
        "{}",
        crate::report::format_aggregate_table(&run.table, &config.buckets)
    );

    if let Some(path) = &config.export_path {
        io::export::write_aggregate_csv(path, &run.table, &config.buckets)
            .map_err(|e| stage_failure(Stage::Analyze, e))?;
        println!("Aggregated table exported to {}", path.display());
    }

    crate::plot::render_cost_chart(&config.out_path, &run.table, config)
        .map_err(|e| stage_failure(Stage::Plot, e))?;
    println!("Chart saved to {}", config.out_path.display());

    Ok(())
}

fn stage_failure(stage: Stage, err: AppError) -> AppError {
    AppError::new(
        err.exit_code(),
        format!("Stage `{}` failed: {err}", stage.display_name()),
    )
}
