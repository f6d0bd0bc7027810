//! Windowed request statistics and per-session reports.
mod aggregator;
mod histogram;
mod report;
mod summary;


use std::time::Duration;

pub use aggregator::{Aggregator, setup_aggregator};
pub use histogram::LatencyHistogram;
pub use report::{Report, SessionReport};
pub use summary::{LatencyStats, RollingSummary, SizeStats, WindowSummary};

/// Whole milliseconds, truncating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
