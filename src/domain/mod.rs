//! Domain model: trades, reference prices, size buckets, and run configuration.

mod types;

pub use types::*;
