//! Export the aggregated table to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts; bucket labels contain commas, so rows go through the `csv`
//! writer for proper quoting.

use std::path::Path;

use crate::domain::{AggregateTable, SizeBuckets};
use crate::error::AppError;

/// Write one row per (source, bucket) cell.
pub fn write_aggregate_csv(
    path: &Path,
    table: &AggregateTable,
    buckets: &SizeBuckets,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create export CSV '{}': {e}", path.display()),
        )
    })?;

    writer
        .write_record(["source", "bucket", "bucket_size", "mean_deviation", "samples"])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for row in &table.rows {
        writer
            .write_record([
                row.source.slug().to_string(),
                buckets.label(row.bucket),
                format!("{}", buckets.representative_size(row.bucket)),
                format!("{:.10}", row.mean_deviation),
                row.samples.to_string(),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;

    Ok(())
}
