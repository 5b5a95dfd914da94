//! Tick counting and tick-duration statistics
//!
//! The host's tick hook owns a [`TickCounter`] and reports each completed
//! cycle to it. The counter doubles as the [`TickSource`] the ticked
//! aggregator polls.

use serde_json::json;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tickscope_common::TickSource;

use super::{RollingAverage, StatisticsProvider};

/// Nominal host cadence the windows are sized for
const TICKS_PER_SECOND: usize = 20;

/// Monotonic tick counter advanced by the host
#[derive(Debug, Default)]
pub struct TickCounter {
    tick: AtomicI64,
    statistics: Option<Arc<TickStatistics>>,
}

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter that also records every completed tick's duration
    pub fn with_statistics(statistics: Arc<TickStatistics>) -> Self {
        Self {
            tick: AtomicI64::new(0),
            statistics: Some(statistics),
        }
    }

    /// Move to the next tick, returning its number
    pub fn advance(&self) -> i64 {
        self.tick.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record how long the finished tick took, then advance
    pub fn complete_tick(&self, duration: Duration) -> i64 {
        if let Some(statistics) = &self.statistics {
            statistics.record_tick(duration);
        }
        self.advance()
    }
}

impl TickSource for TickCounter {
    fn current_tick(&self) -> i64 {
        self.tick.load(Ordering::Acquire)
    }
}

/// Milliseconds-per-tick over recent windows
#[derive(Debug)]
pub struct TickStatistics {
    mspt_10s: RollingAverage,
    mspt_1m: RollingAverage,
    ticks: AtomicU64,
}

impl Default for TickStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl TickStatistics {
    pub fn new() -> Self {
        Self {
            mspt_10s: RollingAverage::new(TICKS_PER_SECOND * 10),
            mspt_1m: RollingAverage::new(TICKS_PER_SECOND * 60),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn record_tick(&self, duration: Duration) {
        let millis = duration.as_secs_f64() * 1_000.0;
        self.mspt_10s.add(millis);
        self.mspt_1m.add(millis);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mspt_10s(&self) -> &RollingAverage {
        &self.mspt_10s
    }

    pub fn mspt_1m(&self) -> &RollingAverage {
        &self.mspt_1m
    }

    pub fn ticks_recorded(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl StatisticsProvider for TickStatistics {
    fn name(&self) -> &str {
        "ticks"
    }

    fn collect(&self) -> anyhow::Result<serde_json::Value> {
        Ok(json!({
            "ticksRecorded": self.ticks_recorded(),
            "msptLast10s": self.mspt_10s.summary(),
            "msptLast1m": self.mspt_1m.summary(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_monotonically() {
        let counter = TickCounter::new();
        assert_eq!(counter.current_tick(), 0);
        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.advance(), 2);
        assert_eq!(counter.current_tick(), 2);
    }

    #[test]
    fn test_complete_tick_records_duration() {
        let statistics = Arc::new(TickStatistics::new());
        let counter = TickCounter::with_statistics(statistics.clone());

        counter.complete_tick(Duration::from_millis(40));
        counter.complete_tick(Duration::from_millis(60));

        assert_eq!(counter.current_tick(), 2);
        assert_eq!(statistics.ticks_recorded(), 2);
        assert!((statistics.mspt_10s().mean() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_capacities() {
        let statistics = TickStatistics::new();
        assert_eq!(statistics.mspt_10s().capacity(), 200);
        assert_eq!(statistics.mspt_1m().capacity(), 1_200);
    }

    #[test]
    fn test_collect_block() {
        let statistics = TickStatistics::new();
        statistics.record_tick(Duration::from_millis(50));
        let block = statistics.collect().unwrap();
        assert_eq!(block["ticksRecorded"], 1);
        assert_eq!(block["msptLast10s"]["count"], 1);
    }
}
