//! Source fetchers: one module per DEX, sharing a single subgraph client.
//!
//! Each fetcher turns raw subgraph rows into normalized [`Trade`] records:
//! pair-filtered, range-filtered, with unsigned base/quote volumes and the
//! realized price in quote-per-base. Malformed upstream data is fatal to
//! that fetcher run; leniency is reserved for re-reading our own files.

pub mod cowswap;
pub mod subgraph;
pub mod uniswap_v2;
pub mod uniswap_v3;

pub use subgraph::SubgraphClient;

use chrono::{DateTime, Utc};

use crate::domain::{RunConfig, Trade, TradeSource};
use crate::error::AppError;

/// Fetch and normalize all in-range trades for one source.
pub fn fetch_source(
    client: &SubgraphClient,
    source: TradeSource,
    config: &RunConfig,
) -> Result<Vec<Trade>, AppError> {
    match source {
        TradeSource::UniswapV2 => uniswap_v2::fetch_trades(client, config),
        TradeSource::UniswapV3 => uniswap_v3::fetch_trades(client, config),
        TradeSource::Cowswap => cowswap::fetch_trades(client, config),
    }
}

/// Parse a subgraph timestamp (decimal string, unix seconds).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let secs = raw
        .parse::<i64>()
        .map_err(|_| AppError::new(4, format!("Invalid swap timestamp '{raw}'.")))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::new(4, format!("Out-of-range swap timestamp '{raw}'.")))
}

/// Parse a subgraph decimal-string amount.
pub(crate) fn parse_amount(raw: &str, field: &str) -> Result<f64, AppError> {
    let v = raw
        .parse::<f64>()
        .map_err(|_| AppError::new(4, format!("Invalid `{field}` amount '{raw}'.")))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(AppError::new(4, format!("Non-finite `{field}` amount '{raw}'.")))
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::PathBuf;
    use std::time::Duration;

    use chrono::TimeZone;

    use crate::domain::{DateRange, RunConfig, SizeBuckets, TradeSource, TradingPair};

    /// A fixed WETH/USDT config over 2024-01-01 for fetcher tests.
    pub fn config() -> RunConfig {
        let start = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        RunConfig {
            pair: TradingPair::new("WETH", "USDT"),
            range: DateRange::new(start, end).unwrap(),
            buckets: SizeBuckets::new(vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0]).unwrap(),
            resample: Duration::from_secs(60),
            min_samples: 1,
            sources: TradeSource::ALL.to_vec(),
            data_dir: PathBuf::from("data"),
            reference_path: PathBuf::from("data/reference_WETH_USDT.csv"),
            out_path: PathBuf::from("results/average_costs.png"),
            export_path: None,
            page_size: 1000,
            page_delay: Duration::from_millis(0),
            timeout: Duration::from_secs(30),
        }
    }
}
