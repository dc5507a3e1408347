//! Uniswap v3 swap fetcher.
//!
//! The v3 subgraph reports two *signed* token deltas per swap: positive
//! amounts flow into the pool, negative amounts flow out. The realized
//! price only needs the magnitudes.

use serde::Deserialize;

use crate::data::subgraph::{PagedRow, SubgraphClient};
use crate::data::{parse_amount, parse_timestamp};
use crate::domain::{RunConfig, Trade, TradeSource};
use crate::error::AppError;

const SUBGRAPH_ID: &str = "HUZDsRpEVP2AvzDCyzDHtdc64dyDxx8FQjzsmqSg4H3B";

const QUERY: &str = r#"
query($startTime: Int!, $endTime: Int!, $lastID: String!, $first: Int!) {
  swaps(
    where: {
      timestamp_gte: $startTime,
      timestamp_lte: $endTime,
      id_gt: $lastID
    }
    orderBy: id
    orderDirection: asc
    first: $first
  ) {
    id
    timestamp
    amount0
    amount1
    pool {
      token0 { symbol }
      token1 { symbol }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct RawSwap {
    id: String,
    timestamp: String,
    amount0: String,
    amount1: String,
    pool: RawPool,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    token0: RawToken,
    token1: RawToken,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    symbol: String,
}

impl PagedRow for RawSwap {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn fetch_trades(client: &SubgraphClient, config: &RunConfig) -> Result<Vec<Trade>, AppError> {
    let raw: Vec<RawSwap> = client.fetch_all(SUBGRAPH_ID, "swaps", QUERY, &config.range)?;

    let mut trades = Vec::new();
    for swap in &raw {
        if let Some(trade) = normalize(swap, config)? {
            trades.push(trade);
        }
    }
    Ok(trades)
}

fn normalize(swap: &RawSwap, config: &RunConfig) -> Result<Option<Trade>, AppError> {
    let t0 = &swap.pool.token0.symbol;
    let t1 = &swap.pool.token1.symbol;
    if !config.pair.matches(t0, t1) {
        return Ok(None);
    }

    let timestamp = parse_timestamp(&swap.timestamp)?;
    if !config.range.contains(timestamp) {
        return Ok(None);
    }

    let a0 = parse_amount(&swap.amount0, "amount0")?;
    let a1 = parse_amount(&swap.amount1, "amount1")?;

    let (base_signed, quote_signed) = if config.pair.is_base(t0) {
        (a0, a1)
    } else {
        (a1, a0)
    };

    let base_amount = base_signed.abs();
    let quote_amount = quote_signed.abs();
    if base_amount <= 0.0 || quote_amount <= 0.0 {
        return Ok(None);
    }

    Ok(Some(Trade {
        source: TradeSource::UniswapV3,
        timestamp,
        base_amount,
        quote_amount,
        price: quote_amount / base_amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testutil;

    fn swap(t0: &str, t1: &str, amount0: &str, amount1: &str) -> RawSwap {
        RawSwap {
            id: "0xabc".to_string(),
            timestamp: "1704067200".to_string(),
            amount0: amount0.to_string(),
            amount1: amount1.to_string(),
            pool: RawPool {
                token0: RawToken { symbol: t0.to_string() },
                token1: RawToken { symbol: t1.to_string() },
            },
        }
    }

    #[test]
    fn signed_deltas_normalize_to_magnitudes() {
        let config = testutil::config();
        // WETH into the pool, USDT out.
        let raw = swap("WETH", "USDT", "1.5", "-3375.0");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.base_amount, 1.5);
        assert_eq!(trade.quote_amount, 3375.0);
        assert_eq!(trade.price, 2250.0);
    }

    #[test]
    fn opposite_direction_gives_same_price_convention() {
        let config = testutil::config();
        // USDT into the pool, WETH out.
        let raw = swap("WETH", "USDT", "-1.5", "3375.0");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.price, 2250.0);
    }

    #[test]
    fn zero_delta_rows_are_dropped() {
        let config = testutil::config();
        let raw = swap("WETH", "USDT", "0", "0");

        assert!(normalize(&raw, &config).unwrap().is_none());
    }

    #[test]
    fn other_pools_are_filtered_out() {
        let config = testutil::config();
        let raw = swap("WBTC", "USDT", "1.0", "-43000.0");

        assert!(normalize(&raw, &config).unwrap().is_none());
    }
}
