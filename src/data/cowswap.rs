//! Cowswap (CoW Protocol) order fetcher.
//!
//! Orders carry explicit sell/buy tokens and amounts, so direction handling
//! is simpler than for the Uniswap pools. The public subgraph for settled
//! orders is thinner than the Uniswap ones; runs that cannot reach it can
//! drop the source with `--source`.

use serde::Deserialize;

use crate::data::subgraph::{PagedRow, SubgraphClient};
use crate::data::{parse_amount, parse_timestamp};
use crate::domain::{RunConfig, Trade, TradeSource};
use crate::error::AppError;

const SUBGRAPH_ID: &str = "H2gFH3qBTB1GPzy1xTbf85P9JMhq6sHGMmu1JKUmA6bg";

const QUERY: &str = r#"
query($startTime: Int!, $endTime: Int!, $lastID: String!, $first: Int!) {
  orders(
    where: {
      creationTimestamp_gte: $startTime,
      creationTimestamp_lte: $endTime,
      id_gt: $lastID
    }
    orderBy: id
    orderDirection: asc
    first: $first
  ) {
    id
    creationTimestamp
    sellToken { symbol }
    buyToken { symbol }
    sellAmount
    buyAmount
  }
}
"#;

#[derive(Debug, Deserialize)]
struct RawOrder {
    id: String,
    #[serde(rename = "creationTimestamp")]
    creation_timestamp: String,
    #[serde(rename = "sellToken")]
    sell_token: RawToken,
    #[serde(rename = "buyToken")]
    buy_token: RawToken,
    #[serde(rename = "sellAmount")]
    sell_amount: String,
    #[serde(rename = "buyAmount")]
    buy_amount: String,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    symbol: String,
}

impl PagedRow for RawOrder {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn fetch_trades(client: &SubgraphClient, config: &RunConfig) -> Result<Vec<Trade>, AppError> {
    let raw: Vec<RawOrder> = client.fetch_all(SUBGRAPH_ID, "orders", QUERY, &config.range)?;

    let mut trades = Vec::new();
    for order in &raw {
        if let Some(trade) = normalize(order, config)? {
            trades.push(trade);
        }
    }
    Ok(trades)
}

fn normalize(order: &RawOrder, config: &RunConfig) -> Result<Option<Trade>, AppError> {
    let sell = &order.sell_token.symbol;
    let buy = &order.buy_token.symbol;
    if !config.pair.matches(sell, buy) {
        return Ok(None);
    }

    let timestamp = parse_timestamp(&order.creation_timestamp)?;
    if !config.range.contains(timestamp) {
        return Ok(None);
    }

    let sell_amount = parse_amount(&order.sell_amount, "sellAmount")?;
    let buy_amount = parse_amount(&order.buy_amount, "buyAmount")?;

    let (base_amount, quote_amount) = if config.pair.is_base(sell) {
        (sell_amount, buy_amount)
    } else {
        (buy_amount, sell_amount)
    };
    if base_amount <= 0.0 || quote_amount <= 0.0 {
        return Ok(None);
    }

    Ok(Some(Trade {
        source: TradeSource::Cowswap,
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

    fn order(sell: &str, buy: &str, sell_amount: &str, buy_amount: &str) -> RawOrder {
        RawOrder {
            id: "0xdef".to_string(),
            creation_timestamp: "1704070800".to_string(),
            sell_token: RawToken { symbol: sell.to_string() },
            buy_token: RawToken { symbol: buy.to_string() },
            sell_amount: sell_amount.to_string(),
            buy_amount: buy_amount.to_string(),
        }
    }

    #[test]
    fn sell_base_order_normalizes() {
        let config = testutil::config();
        let raw = order("WETH", "USDT", "2.0", "4500.0");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.base_amount, 2.0);
        assert_eq!(trade.price, 2250.0);
    }

    #[test]
    fn buy_base_order_uses_same_price_convention() {
        let config = testutil::config();
        let raw = order("USDT", "WETH", "4500.0", "2.0");

        let trade = normalize(&raw, &config).unwrap().unwrap();
        assert_eq!(trade.base_amount, 2.0);
        assert_eq!(trade.quote_amount, 4500.0);
        assert_eq!(trade.price, 2250.0);
    }

    #[test]
    fn unrelated_orders_are_filtered_out() {
        let config = testutil::config();
        let raw = order("DAI", "USDT", "100.0", "100.0");

        assert!(normalize(&raw, &config).unwrap().is_none());
    }
}
