//! Deviation analysis: reference alignment, per-trade cost deviation, and
//! size-bucket aggregation.
//!
//! Design goals:
//! - **Deterministic**: ordered-map aggregation, so rerunning on unchanged
//!   inputs yields an identical table
//! - **Fail loud on coverage gaps**: a trade with no preceding reference
//!   point aborts the run instead of silently biasing the averages

use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::{
    AggregateRow, AggregateTable, BucketId, CostDeviation, ReferencePoint, SizeBuckets, Trade,
    TradeSource,
};
use crate::error::AppError;

/// Reference mid-price series, sorted by timestamp, ready for
/// nearest-preceding lookups.
#[derive(Debug, Clone)]
pub struct ReferenceSeries {
    points: Vec<ReferencePoint>,
}

impl ReferenceSeries {
    pub fn new(mut points: Vec<ReferencePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp_ms);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mid-price prevailing at `ts_ms`: the closest point **not later than**
    /// the timestamp. A timestamp exactly equal to a reference point's
    /// matches that point.
    pub fn mid_at(&self, ts_ms: i64) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.timestamp_ms <= ts_ms);
        if idx == 0 {
            return None;
        }
        Some(self.points[idx - 1].mid_price)
    }
}

/// Resample the series to fixed-interval mean mid-prices, forward-filling
/// intervals with no observations.
///
/// Interval boundaries are aligned to the epoch, so the same input always
/// resamples to the same grid.
pub fn resample_mid_prices(series: &ReferenceSeries, interval: Duration) -> ReferenceSeries {
    let interval_ms = interval.as_millis() as i64;
    if interval_ms <= 0 || series.is_empty() {
        return series.clone();
    }

    // Mean per interval, keyed by interval start.
    let mut cells: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for p in &series.points {
        let start = p.timestamp_ms.div_euclid(interval_ms) * interval_ms;
        let cell = cells.entry(start).or_insert((0.0, 0));
        cell.0 += p.mid_price;
        cell.1 += 1;
    }

    let (first, last) = match (cells.keys().next(), cells.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return series.clone(),
    };

    let mut out = Vec::with_capacity(((last - first) / interval_ms + 1) as usize);
    let mut prev = None;
    let mut t = first;
    while t <= last {
        let mid = match cells.get(&t) {
            Some((sum, n)) => sum / *n as f64,
            // The first interval always has an observation, so `prev` is set
            // by the time a gap appears.
            None => match prev {
                Some(mid) => mid,
                None => {
                    t += interval_ms;
                    continue;
                }
            },
        };
        out.push(ReferencePoint {
            timestamp_ms: t,
            mid_price: mid,
        });
        prev = Some(mid);
        t += interval_ms;
    }

    ReferenceSeries { points: out }
}

/// Join each trade to the reference mid-price prevailing at its timestamp
/// and compute the relative cost deviation.
pub fn compute_deviations(
    trades: &[Trade],
    reference: &ReferenceSeries,
) -> Result<Vec<CostDeviation>, AppError> {
    let mut out = Vec::with_capacity(trades.len());
    for trade in trades {
        let Some(mid) = reference.mid_at(trade.timestamp_ms()) else {
            return Err(AppError::new(
                5,
                format!(
                    "No reference mid-price at or before {} ({} trade); excluding it would bias the averages.",
                    trade.timestamp,
                    trade.source.display_name()
                ),
            ));
        };
        out.push(CostDeviation {
            trade: trade.clone(),
            mid_price: mid,
            deviation: (trade.price - mid) / mid,
        });
    }
    Ok(out)
}

/// Mean deviation and sample count per (source, bucket).
///
/// Cells with zero samples never materialize, so empty buckets (and sources
/// with no trades) are omitted rather than zero-filled.
pub fn aggregate(deviations: &[CostDeviation], buckets: &SizeBuckets) -> AggregateTable {
    let mut cells: BTreeMap<(TradeSource, BucketId), (f64, usize)> = BTreeMap::new();
    for d in deviations {
        let bucket = buckets.assign(d.trade.base_amount);
        let cell = cells.entry((d.trade.source, bucket)).or_insert((0.0, 0));
        cell.0 += d.deviation;
        cell.1 += 1;
    }

    let rows = cells
        .into_iter()
        .map(|((source, bucket), (sum, n))| AggregateRow {
            source,
            bucket,
            mean_deviation: sum / n as f64,
            samples: n,
        })
        .collect();

    AggregateTable { rows }
}
