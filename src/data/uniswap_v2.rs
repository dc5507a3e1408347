//! Uniswap v2 swap fetcher.
//!
//! The v2 subgraph reports four directional amounts per swap
//! (`amount0In/Out`, `amount1In/Out`); for a normal swap exactly one side
//! of each token is non-zero.

use serde::Deserialize;

use crate::data::subgraph::{PagedRow, SubgraphClient};
use crate::data::{parse_amount, parse_timestamp};
use crate::domain::{RunConfig, Trade, TradeSource};
use crate::error::AppError;

const SUBGRAPH_ID: &str = "EYCKATKGBKLWvSfwvBjzfCBmGwYNdVkduYXVivCsLRFu";

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
    amount0In
    amount0Out
    amount1In
    amount1Out
    pair {
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
    #[serde(rename = "amount0In")]
    amount0_in: String,
    #[serde(rename = "amount0Out")]
    amount0_out: String,
    #[serde(rename = "amount1In")]
    amount1_in: String,
    #[serde(rename = "amount1Out")]
    amount1_out: String,
    pair: RawPair,
}

#[derive(Debug, Deserialize)]
struct RawPair {
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

/// Normalize one raw swap, or `None` when it is not a usable trade for the
/// configured pair.
fn normalize(swap: &RawSwap, config: &RunConfig) -> Result<Option<Trade>, AppError> {
    let t0 = &swap.pair.token0.symbol;
    let t1 = &swap.pair.token1.symbol;
    if !config.pair.matches(t0, t1) {
        return Ok(None);
    }

    let timestamp = parse_timestamp(&swap.timestamp)?;
    if !config.range.contains(timestamp) {
        return Ok(None);
    }

    let a0_in = parse_amount(&swap.amount0_in, "amount0In")?;
    let a0_out = parse_amount(&swap.amount0_out, "amount0Out")?;
    let a1_in = parse_amount(&swap.amount1_in, "amount1In")?;
    let a1_out = parse_amount(&swap.amount1_out, "amount1Out")?;

    let (base_in, base_out, quote_in, quote_out) = if config.pair.is_base(t0) {
        (a0_in, a0_out, a1_in, a1_out)
    } else {
        (a1_in, a1_out, a0_in, a0_out)
    };

    // One direction per side is populated; the other is zero.
    let base_amount = base_in.max(base_out);
    let quote_amount = quote_in.max(quote_out);
    if base_amount <= 0.0 || quote_amount <= 0.0 {
        return Ok(None);
    }

    Ok(Some(Trade {
        source: TradeSource::UniswapV2,
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

    fn swap(t0: &str, t1: &str, amounts: [&str; 4], timestamp: &str) -> RawSwap {
        RawSwap {
            id: "0x1".to_string(),
            timestamp: timestamp.to_string(),
            amount0_in: amounts[0].to_string(),
            amount0_out: amounts[1].to_string(),
            amount1_in: amounts[2].to_string(),
            amount1_out: amounts[3].to_string(),
            pair: RawPair {
                token0: RawToken { symbol: t0.to_string() },
                token1: RawToken { symbol: t1.to_string() },
            },
        }
    }

    #[test]
    fn weth_sold_for_usdt() {
        let config = testutil::config();
        // 1 WETH in, 2000 USDT out; token0 = WETH.
        let raw = swap("WETH", "USDT", ["1.0", "0", "0", "2000.0"], "1704067200");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.base_amount, 1.0);
        assert_eq!(trade.quote_amount, 2000.0);
        assert_eq!(trade.price, 2000.0);
    }

    #[test]
    fn reversed_token_order_still_normalizes() {
        let config = testutil::config();
        // token0 = USDT: 4500 USDT in, 2 WETH out.
        let raw = swap("USDT", "WETH", ["4500.0", "0", "0", "2.0"], "1704067200");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.base_amount, 2.0);
        assert_eq!(trade.price, 2250.0);
    }

    #[test]
    fn other_pairs_are_filtered_out() {
        let config = testutil::config();
        let raw = swap("WETH", "USDC", ["1.0", "0", "0", "2000.0"], "1704067200");

        assert!(normalize(&raw, &config).unwrap().is_none());
    }

    #[test]
    fn out_of_range_swaps_are_dropped() {
        let config = testutil::config();
        // 2024-01-05, past the configured end.
        let raw = swap("WETH", "USDT", ["1.0", "0", "0", "2000.0"], "1704412800");

        assert!(normalize(&raw, &config).unwrap().is_none());
    }

    #[test]
    fn malformed_amount_is_a_fetch_error() {
        let config = testutil::config();
        let raw = swap("WETH", "USDT", ["abc", "0", "0", "2000.0"], "1704067200");

        let err = normalize(&raw, &config).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
