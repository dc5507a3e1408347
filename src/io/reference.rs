//! Reference mid-price snapshot reader.
//!
//! The snapshot is produced outside this pipeline and treated as read-only:
//! one row per timestamp with a mid-price column. Required columns are
//! `timestamp` (unix milliseconds; `timestamp_ms` is accepted too) and
//! `mid_price`; any extra columns the export carries are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::domain::ReferencePoint;
use crate::error::AppError;

/// Load the snapshot, skipping rows with missing or non-finite values.
///
/// A snapshot with no usable rows at all cannot anchor any trade, which is
/// a coverage error rather than a file-format one.
pub fn read_reference_csv(path: &Path) -> Result<Vec<ReferencePoint>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open reference snapshot '{}': {e}", path.display()),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read reference headers: {e}")))?
        .clone();

    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            (
                name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(),
                idx,
            )
        })
        .collect();

    let ts_idx = map
        .get("timestamp")
        .or_else(|| map.get("timestamp_ms"))
        .copied()
        .ok_or_else(|| {
            AppError::new(2, "Missing required reference column: `timestamp` (unix ms).")
        })?;
    let mid_idx = map
        .get("mid_price")
        .copied()
        .ok_or_else(|| AppError::new(2, "Missing required reference column: `mid_price`."))?;

    let mut points = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(_) => continue,
        };

        let Some(timestamp_ms) = record.get(ts_idx).and_then(|s| s.trim().parse::<i64>().ok())
        else {
            continue;
        };
        let Some(mid_price) = record.get(mid_idx).and_then(parse_price) else {
            continue;
        };

        points.push(ReferencePoint {
            timestamp_ms,
            mid_price,
        });
    }

    if points.is_empty() {
        return Err(AppError::new(
            5,
            format!(
                "Reference snapshot '{}' contains no usable rows.",
                path.display()
            ),
        ));
    }

    points.sort_by_key(|p| p.timestamp_ms);
    Ok(points)
}

fn parse_price(raw: &str) -> Option<f64> {
    let v = raw.trim().parse::<f64>().ok()?;
    if v.is_finite() && v > 0.0 { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_snapshot_and_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(
            &path,
            "timestamp,datetime,mid_price,volume\n\
             1704067260000,2024-01-01T00:01:00Z,2251.5,12.0\n\
             1704067200000,2024-01-01T00:00:00Z,2250.0,10.5\n",
        )
        .unwrap();

        let points = read_reference_csv(&path).unwrap();
        assert_eq!(points.len(), 2);
        // Sorted ascending regardless of file order.
        assert_eq!(points[0].timestamp_ms, 1_704_067_200_000);
        assert_eq!(points[0].mid_price, 2250.0);
    }

    #[test]
    fn bad_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(
            &path,
            "timestamp,mid_price\n\
             1704067200000,2250.0\n\
             oops,2251.0\n\
             1704067320000,-5.0\n\
             1704067380000,2253.25\n",
        )
        .unwrap();

        let points = read_reference_csv(&path).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn snapshot_without_usable_rows_is_a_coverage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(&path, "timestamp,mid_price\nx,y\n").unwrap();

        let err = read_reference_csv(&path).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }
}
