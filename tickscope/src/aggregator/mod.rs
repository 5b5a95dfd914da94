//! Data aggregation
//!
//! Turns the stream of thread dumps pushed by the sampler into one call tree
//! per group key.
//!
//! ## Data Flow
//!
//! ```text
//! Sampler tick
//!     │ Vec<ThreadSnapshot>
//!     ▼
//! DataAggregator::insert_data()
//!     │
//!     ├── Simple ─────────────────────────┐
//!     │                                   ▼
//!     └── Ticked ──► TickBuffer ──► SimpleDataAggregator::submit()
//!          (short ticks discarded)        │ filter, group
//!                                         ▼
//!                                    MergePool shards ──► ThreadNode roots
//! ```
//!
//! `get_data()` drains all pending merges before returning, so the result is a
//! consistent view of everything inserted before the call.

pub mod grouper;
mod pool;
pub mod simple;
pub mod ticked;

use serde::Serialize;
use std::collections::HashMap;

use tickscope_common::ThreadSnapshot;

use crate::domain::{Interval, SamplerError};
use crate::tree::ThreadNode;

pub use grouper::{ThreadGrouper, ALL_THREADS_KEY};
pub use simple::SimpleDataAggregator;
pub use ticked::TickedDataAggregator;

/// Settings shared by every aggregator variant
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Time attributed to each sample
    pub interval: Interval,
    pub grouper: ThreadGrouper,
    /// Drop samples of threads captured while sleeping/parked
    pub ignore_sleeping: bool,
    /// Drop samples of threads captured in native code
    pub ignore_native: bool,
    /// Number of merge shards
    pub worker_threads: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: Interval(10_000),
            grouper: ThreadGrouper::default(),
            ignore_sleeping: false,
            ignore_native: false,
            worker_threads: default_worker_threads(),
        }
    }
}

impl AggregatorConfig {
    /// # Errors
    /// Returns [`SamplerError::InvalidConfig`] for a zero interval or zero workers
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.interval.as_micros() == 0 {
            return Err(SamplerError::InvalidConfig(
                "interval must be positive".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(SamplerError::InvalidConfig(
                "worker_threads must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Available parallelism, capped at 4
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map_or(1, |n| n.get().min(4))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    Simple,
    Ticked,
}

/// Describes an aggregator in the exported report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAggregatorMetadata {
    #[serde(rename = "type")]
    pub kind: AggregatorKind,
    pub thread_grouper: ThreadGrouper,
    /// Microseconds; only set for ticked aggregators
    #[serde(rename = "tickLengthThresholdMicros", skip_serializing_if = "Option::is_none")]
    pub tick_length_threshold: Option<u64>,
}

/// The aggregator variants a sampler can drive
pub enum DataAggregator {
    Simple(SimpleDataAggregator),
    Ticked(TickedDataAggregator),
}

impl DataAggregator {
    pub fn insert_data(&self, snapshots: Vec<ThreadSnapshot>) {
        match self {
            DataAggregator::Simple(agg) => agg.insert_data(snapshots),
            DataAggregator::Ticked(agg) => agg.insert_data(snapshots),
        }
    }

    pub fn get_data(&self) -> HashMap<String, ThreadNode> {
        match self {
            DataAggregator::Simple(agg) => agg.get_data(),
            DataAggregator::Ticked(agg) => agg.get_data(),
        }
    }

    pub fn metadata(&self) -> DataAggregatorMetadata {
        match self {
            DataAggregator::Simple(agg) => agg.metadata(),
            DataAggregator::Ticked(agg) => agg.metadata(),
        }
    }

    pub fn interval(&self) -> Interval {
        match self {
            DataAggregator::Simple(agg) => agg.interval(),
            DataAggregator::Ticked(agg) => agg.interval(),
        }
    }
}

impl From<SimpleDataAggregator> for DataAggregator {
    fn from(agg: SimpleDataAggregator) -> Self {
        DataAggregator::Simple(agg)
    }
}

impl From<TickedDataAggregator> for DataAggregator {
    fn from(agg: TickedDataAggregator) -> Self {
        DataAggregator::Ticked(agg)
    }
}
