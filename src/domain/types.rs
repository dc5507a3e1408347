//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during analysis
//! - written to / reloaded from the flat files that connect the stages
//! - constructed directly in tests without any I/O

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A DEX trade-data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TradeSource {
    UniswapV2,
    UniswapV3,
    Cowswap,
}

impl TradeSource {
    pub const ALL: [TradeSource; 3] = [
        TradeSource::UniswapV2,
        TradeSource::UniswapV3,
        TradeSource::Cowswap,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            TradeSource::UniswapV2 => "Uniswap v2",
            TradeSource::UniswapV3 => "Uniswap v3",
            TradeSource::Cowswap => "Cowswap",
        }
    }

    /// File-name component for the per-source trade CSV.
    pub fn slug(self) -> &'static str {
        match self {
            TradeSource::UniswapV2 => "uniswap_v2",
            TradeSource::UniswapV3 => "uniswap_v3",
            TradeSource::Cowswap => "cowswap",
        }
    }
}

/// The asset pair under comparison.
///
/// Prices are always expressed in `quote` units per `base` unit, regardless
/// of which side of a swap the base asset was on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_ascii_uppercase(),
            quote: quote.into().to_ascii_uppercase(),
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// True when `a` and `b` are exactly this pair's symbols, in either order.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (a.eq_ignore_ascii_case(&self.base) && b.eq_ignore_ascii_case(&self.quote))
            || (a.eq_ignore_ascii_case(&self.quote) && b.eq_ignore_ascii_case(&self.base))
    }

    pub fn is_base(&self, symbol: &str) -> bool {
        symbol.eq_ignore_ascii_case(&self.base)
    }
}

/// Inclusive UTC time range for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a validated range: non-empty and entirely in the past.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::new(
                2,
                format!("Empty date range: start ({start}) must be before end ({end})."),
            ));
        }
        if end > Utc::now() {
            return Err(AppError::new(
                2,
                format!("Date range must lie in the past; end ({end}) is in the future."),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn start_unix(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_unix(&self) -> i64 {
        self.end.timestamp()
    }

    pub fn label(&self) -> String {
        format!(
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// One executed swap, normalized across sources.
///
/// `base_amount` and `quote_amount` are unsigned volumes regardless of trade
/// direction; `price` is the realized execution price (`quote_amount /
/// base_amount`). Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub source: TradeSource,
    pub timestamp: DateTime<Utc>,
    pub base_amount: f64,
    pub quote_amount: f64,
    pub price: f64,
}

impl Trade {
    /// Trade timestamp widened to milliseconds for joins against the
    /// reference series.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// A timestamped mid-price from the reference venue (millisecond precision).
/// Externally supplied, never produced by this pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePoint {
    pub timestamp_ms: i64,
    pub mid_price: f64,
}

/// A trade joined to the reference mid-price prevailing at its timestamp.
///
/// `deviation` is relative: `(price - mid_price) / mid_price`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostDeviation {
    pub trade: Trade,
    pub mid_price: f64,
    pub deviation: f64,
}

/// Index of a trade-size bucket (position among the configured edges; the
/// value one past the last edge is the open-ended overflow bucket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId(pub usize);

/// Ascending trade-size bucket edges, in base-asset units.
///
/// Bucket `k` covers `(edge[k-1], edge[k]]`; the first bucket covers
/// `(0, edge[0]]`. Sizes above the last edge land in an overflow bucket so
/// no in-range trade is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBuckets {
    edges: Vec<f64>,
}

impl SizeBuckets {
    pub fn new(edges: Vec<f64>) -> Result<Self, AppError> {
        if edges.is_empty() {
            return Err(AppError::new(2, "Size buckets require at least one edge."));
        }
        for w in edges.windows(2) {
            if w[1] <= w[0] {
                return Err(AppError::new(
                    2,
                    format!("Size bucket edges must be strictly ascending ({} then {}).", w[0], w[1]),
                ));
            }
        }
        if edges.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(AppError::new(2, "Size bucket edges must be finite and > 0."));
        }
        Ok(Self { edges })
    }

    /// The smallest bucket containing `size`.
    pub fn assign(&self, size: f64) -> BucketId {
        BucketId(self.edges.partition_point(|edge| *edge < size))
    }

    /// Number of buckets, overflow included.
    pub fn count(&self) -> usize {
        self.edges.len() + 1
    }

    pub fn label(&self, bucket: BucketId) -> String {
        let k = bucket.0;
        if k >= self.edges.len() {
            return format!("> {}", self.edges[self.edges.len() - 1]);
        }
        let lower = if k == 0 { 0.0 } else { self.edges[k - 1] };
        format!("({}, {}]", lower, self.edges[k])
    }

    /// X-axis position for a bucket: its upper edge, or one decade past the
    /// last edge for the overflow bucket (the chart x-axis is logarithmic).
    pub fn representative_size(&self, bucket: BucketId) -> f64 {
        let k = bucket.0;
        if k >= self.edges.len() {
            self.edges[self.edges.len() - 1] * 10.0
        } else {
            self.edges[k]
        }
    }
}

/// One row of the aggregated output: mean cost deviation for a
/// (source, bucket) cell, with the sample count retained for downstream
/// low-sample filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub source: TradeSource,
    pub bucket: BucketId,
    pub mean_deviation: f64,
    pub samples: usize,
}

/// The combined aggregation result, ordered by (source, bucket).
///
/// Buckets with zero samples for a source are omitted, never zero-filled;
/// a source with no trades at all does not appear.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateTable {
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct sources present, in row order.
    pub fn sources(&self) -> Vec<TradeSource> {
        let mut out = Vec::new();
        for row in &self.rows {
            if !out.contains(&row.source) {
                out.push(row.source);
            }
        }
        out
    }

    pub fn rows_for(&self, source: TradeSource) -> Vec<&AggregateRow> {
        self.rows.iter().filter(|r| r.source == source).collect()
    }
}

/// Resolved configuration for one pipeline run.
///
/// Each stage receives this struct explicitly; nothing reads module-level
/// globals, so tests can run stages against arbitrary pairs and ranges.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pair: TradingPair,
    pub range: DateRange,
    pub buckets: SizeBuckets,
    /// Width of the mid-price resample interval.
    pub resample: Duration,
    /// Minimum samples for a bucket to appear in the chart.
    pub min_samples: usize,
    /// Sources fetched and aggregated in this run.
    pub sources: Vec<TradeSource>,
    pub data_dir: PathBuf,
    pub reference_path: PathBuf,
    pub out_path: PathBuf,
    /// Optional aggregated-table CSV export.
    pub export_path: Option<PathBuf>,
    /// Rows per subgraph page.
    pub page_size: usize,
    /// Delay between subgraph pages.
    pub page_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RunConfig {
    /// Flat-file location for one source's fetched trades.
    pub fn trades_path(&self, source: TradeSource) -> PathBuf {
        self.data_dir.join(format!(
            "{}_{}_{}.csv",
            source.slug(),
            self.pair.base,
            self.pair.quote
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn buckets() -> SizeBuckets {
        SizeBuckets::new(vec![0.1, 0.5, 1.0, 5.0]).unwrap()
    }

    #[test]
    fn bucket_assignment_uses_smallest_containing_bucket() {
        let b = buckets();
        assert_eq!(b.assign(0.05), BucketId(0));
        assert_eq!(b.assign(0.3), BucketId(1));
        // An exact edge belongs to the bucket it closes.
        assert_eq!(b.assign(1.0), BucketId(2));
        assert_eq!(b.assign(1.0001), BucketId(3));
    }

    #[test]
    fn oversized_trades_land_in_overflow_bucket() {
        let b = buckets();
        let overflow = b.assign(7.5);
        assert_eq!(overflow, BucketId(4));
        assert_eq!(b.label(overflow), "> 5");
        assert_eq!(b.count(), 5);
    }

    #[test]
    fn bucket_edges_must_ascend() {
        assert!(SizeBuckets::new(vec![1.0, 0.5]).is_err());
        assert!(SizeBuckets::new(vec![]).is_err());
        assert!(SizeBuckets::new(vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn pair_matches_either_order() {
        let pair = TradingPair::new("weth", "USDT");
        assert_eq!(pair.label(), "WETH/USDT");
        assert!(pair.matches("WETH", "USDT"));
        assert!(pair.matches("usdt", "weth"));
        assert!(!pair.matches("WETH", "USDC"));
    }

    #[test]
    fn date_range_is_inclusive_and_validated() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let range = DateRange::new(start, end).unwrap();

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));

        assert!(DateRange::new(end, start).is_err());
    }
}
