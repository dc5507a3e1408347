//! Per-source trade flat files.
//!
//! One CSV per source, row schema `timestamp,base_amount,quote_amount,price`
//! with the timestamp in unix seconds. Floats are written with Rust's
//! shortest round-trip formatting, so writing then reading a file yields
//! exactly the records that were fetched.
//!
//! Reading is row-tolerant: malformed rows are skipped and reported, never
//! fatal. A file where no data row parses is an empty source, not an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::domain::{Trade, TradeSource};
use crate::error::AppError;

const HEADER: &str = "timestamp,base_amount,quote_amount,price";

/// Write the full trade sequence, overwriting any prior file.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create trade file '{}': {e}", path.display()),
        )
    })?;

    writeln!(file, "{HEADER}")
        .map_err(|e| AppError::new(2, format!("Failed to write trade file header: {e}")))?;

    for t in trades {
        writeln!(
            file,
            "{},{},{},{}",
            t.timestamp.timestamp(),
            t.base_amount,
            t.quote_amount,
            t.price
        )
        .map_err(|e| AppError::new(2, format!("Failed to write trade row: {e}")))?;
    }

    Ok(())
}

/// A row-level error encountered while reading a trade file.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Read output: parsed trades plus row-level accounting.
#[derive(Debug, Clone)]
pub struct TradeFile {
    pub trades: Vec<Trade>,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

/// Read a per-source trade file written by [`write_trades_csv`].
pub fn read_trades_csv(path: &Path, source: TradeSource) -> Result<TradeFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open trade file '{}': {e}", path.display()),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read trade file headers: {e}")))?
        .clone();

    let columns = resolve_columns(&headers)?;

    let mut trades = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header row, and CSV line numbers
        // are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns, source) {
            Ok(trade) => trades.push(trade),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(TradeFile {
        trades,
        rows_read,
        row_errors,
    })
}

struct Columns {
    timestamp: usize,
    base_amount: usize,
    quote_amount: usize,
    price: usize,
}

fn resolve_columns(headers: &StringRecord) -> Result<Columns, AppError> {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        // Strip a possible UTF-8 BOM on the first header; spreadsheet tools
        // add one and schema validation would then miss the column.
        .map(|(idx, name)| {
            (
                name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(),
                idx,
            )
        })
        .collect();

    let get = |name: &str| -> Result<usize, AppError> {
        map.get(name)
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing required trade column: `{name}`")))
    };

    Ok(Columns {
        timestamp: get("timestamp")?,
        base_amount: get("base_amount")?,
        quote_amount: get("quote_amount")?,
        price: get("price")?,
    })
}

fn parse_row(record: &StringRecord, columns: &Columns, source: TradeSource) -> Result<Trade, String> {
    let timestamp = parse_timestamp(get_field(record, columns.timestamp, "timestamp")?)?;
    let base_amount = parse_positive(get_field(record, columns.base_amount, "base_amount")?, "base_amount")?;
    let quote_amount = parse_positive(get_field(record, columns.quote_amount, "quote_amount")?, "quote_amount")?;
    let price = parse_positive(get_field(record, columns.price, "price")?, "price")?;

    Ok(Trade {
        source,
        timestamp,
        base_amount,
        quote_amount,
        price,
    })
}

fn get_field<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{name}` value."))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let secs = raw
        .parse::<i64>()
        .map_err(|_| format!("Invalid `timestamp` '{raw}' (expected unix seconds)."))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| format!("Out-of-range `timestamp` '{raw}'."))
}

fn parse_positive(raw: &str, name: &str) -> Result<f64, String> {
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` '{raw}'."))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("Invalid `{name}` '{raw}' (must be finite and > 0)."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(secs: i64, base: f64, quote: f64) -> Trade {
        Trade {
            source: TradeSource::UniswapV2,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            base_amount: base,
            quote_amount: quote,
            price: quote / base,
        }
    }

    #[test]
    fn round_trip_preserves_records_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uniswap_v2_WETH_USDT.csv");

        // Amounts chosen to exercise non-representable decimals.
        let trades = vec![
            trade(1_704_067_200, 0.1 + 0.2, 678.9012345678901),
            trade(1_704_067_260, 1.0, 2000.0),
            trade(1_704_070_000, 123.456789e-6, 0.2512345),
        ];

        write_trades_csv(&path, &trades).unwrap();
        let file = read_trades_csv(&path, TradeSource::UniswapV2).unwrap();

        assert_eq!(file.trades, trades);
        assert_eq!(file.rows_read, 3);
        assert!(file.row_errors.is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        std::fs::write(
            &path,
            "timestamp,base_amount,quote_amount,price\n\
             1704067200,1.0,2000.0,2000.0\n\
             not-a-number,1.0,2000.0,2000.0\n\
             1704067300,-1.0,2000.0,2000.0\n\
             1704067400,2.0,4000.0,2000.0\n",
        )
        .unwrap();

        let file = read_trades_csv(&path, TradeSource::Cowswap).unwrap();
        assert_eq!(file.trades.len(), 2);
        assert_eq!(file.rows_read, 4);
        assert_eq!(file.row_errors.len(), 2);
        assert_eq!(file.row_errors[0].line, 3);
        assert_eq!(file.row_errors[1].line, 4);
    }

    #[test]
    fn empty_file_is_an_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");

        write_trades_csv(&path, &[]).unwrap();
        let file = read_trades_csv(&path, TradeSource::UniswapV3).unwrap();

        assert!(file.trades.is_empty());
        assert_eq!(file.rows_read, 0);
    }

    #[test]
    fn missing_schema_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        std::fs::write(&path, "timestamp,base_amount,price\n1704067200,1.0,2000.0\n").unwrap();

        let err = read_trades_csv(&path, TradeSource::UniswapV2).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
