//! Runtime health statistics
//!
//! - [`RollingAverage`]: the windowed primitive behind every cadence metric
//! - [`TickCounter`] / [`TickStatistics`]: host tick numbering and duration
//! - [`ProcessStatistics`]: memory/CPU counters from /proc
//!
//! Statistics blocks are gathered once at session end through
//! [`StatisticsProvider`]. A provider that fails is logged and skipped; it
//! never aborts the report.

pub mod process;
pub mod rolling_average;
pub mod ticks;

pub use process::{ProcessSnapshot, ProcessStatistics};
pub use rolling_average::{RollingAverage, RollingSummary};
pub use ticks::{TickCounter, TickStatistics};

/// Push-style sink for a metric produced at its own cadence
pub trait MetricRecorder: Send + Sync {
    fn record(&self, value: f64);
}

/// One named statistics block of the final report
pub trait StatisticsProvider: Send + Sync {
    /// Key of the block in the report
    fn name(&self) -> &str;

    /// # Errors
    /// Any failure to gather the block; the caller logs it and moves on
    fn collect(&self) -> anyhow::Result<serde_json::Value>;
}
