//! Flat-file I/O: per-source trade files, the reference snapshot, and the
//! aggregated-table export.

pub mod export;
pub mod reference;
pub mod trades;
