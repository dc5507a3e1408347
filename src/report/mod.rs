//! Formatted terminal output for fetch and analyze runs.
//!
//! We keep formatting code in one place so:
//! - the fetch/analysis code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::app::pipeline::{AnalysisRun, SourceIngest};
use crate::domain::{AggregateTable, RunConfig, SizeBuckets, TradeSource};

/// One line per completed fetch.
pub fn format_fetch_summary(source: TradeSource, count: usize, path: &Path) -> String {
    format!(
        "Fetched {count} {} trades -> {}",
        source.display_name(),
        path.display()
    )
}

/// Header + per-source ingest accounting for an analyzer run.
pub fn format_analysis_summary(run: &AnalysisRun, config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dexcost - execution cost vs. reference mid ===\n");
    out.push_str(&format!("Pair: {}\n", config.pair.label()));
    out.push_str(&format!("Range: {}\n", config.range.label()));
    out.push_str(&format!(
        "Reference: {} points ({}s resample)\n",
        run.reference_points,
        config.resample.as_secs()
    ));

    for ingest in &run.ingests {
        out.push_str(&format_ingest_line(ingest));
    }
    out.push_str(&format!("Trades joined: {}\n", run.trades_joined));

    out
}

fn format_ingest_line(ingest: &SourceIngest) -> String {
    let mut line = format!(
        "{}: {} rows read, {} used",
        ingest.source.display_name(),
        ingest.rows_read,
        ingest.rows_used
    );

    if !ingest.row_errors.is_empty() {
        line.push_str(&format!(" ({} skipped", ingest.row_errors.len()));
        // A few line numbers are enough to find the culprit rows.
        let lines: Vec<String> = ingest
            .row_errors
            .iter()
            .take(3)
            .map(|e| e.line.to_string())
            .collect();
        line.push_str(&format!(", e.g. line {}", lines.join(", ")));
        line.push(')');
    }

    line.push('\n');
    line
}

/// Render the aggregated table as aligned text, one row per
/// (source, bucket) cell.
pub fn format_aggregate_table(table: &AggregateTable, buckets: &SizeBuckets) -> String {
    if table.is_empty() {
        return "No (source, bucket) cells with samples.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "\n{:<12} {:<14} {:>12} {:>8}\n",
        "source", "bucket", "mean dev", "samples"
    ));

    for row in &table.rows {
        out.push_str(&format!(
            "{:<12} {:<14} {:>11.4}% {:>8}\n",
            row.source.display_name(),
            buckets.label(row.bucket),
            row.mean_deviation * 100.0,
            row.samples
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AggregateRow, BucketId};
    use crate::io::trades::RowError;

    #[test]
    fn aggregate_table_lists_sources_and_buckets() {
        let buckets = SizeBuckets::new(vec![1.0, 10.0]).unwrap();
        let table = AggregateTable {
            rows: vec![AggregateRow {
                source: TradeSource::UniswapV3,
                bucket: BucketId(0),
                mean_deviation: -0.0025,
                samples: 7,
            }],
        };

        let text = format_aggregate_table(&table, &buckets);
        assert!(text.contains("Uniswap v3"));
        assert!(text.contains("(0, 1]"));
        assert!(text.contains("-0.2500%"));
        assert!(text.contains("7"));
    }

    #[test]
    fn ingest_line_reports_skipped_rows() {
        let ingest = SourceIngest {
            source: TradeSource::Cowswap,
            rows_read: 10,
            rows_used: 8,
            row_errors: vec![
                RowError {
                    line: 4,
                    message: "bad".to_string(),
                },
                RowError {
                    line: 9,
                    message: "bad".to_string(),
                },
            ],
        };

        let line = format_ingest_line(&ingest);
        assert!(line.contains("Cowswap: 10 rows read, 8 used"));
        assert!(line.contains("2 skipped"));
        assert!(line.contains("line 4, 9"));
    }
}
