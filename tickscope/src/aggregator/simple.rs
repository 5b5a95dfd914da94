//! Base aggregator: every accepted sample is merged

use std::collections::HashMap;

use tickscope_common::ThreadSnapshot;

use super::pool::{KeyedSnapshot, MergePool};
use super::{AggregatorConfig, AggregatorKind, DataAggregatorMetadata};
use crate::domain::{Interval, SamplerError};
use crate::tree::ThreadNode;

pub struct SimpleDataAggregator {
    pool: MergePool,
    config: AggregatorConfig,
}

impl SimpleDataAggregator {
    /// Start the merge pool described by `config`
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or a merge thread
    /// cannot be spawned
    pub fn new(config: AggregatorConfig) -> Result<Self, SamplerError> {
        config.validate()?;
        let pool = MergePool::new(config.worker_threads, config.interval.weight())?;
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn interval(&self) -> Interval {
        self.config.interval
    }

    /// Queue the threads of one dump for merging
    ///
    /// Returns as soon as the work is queued.
    pub fn insert_data(&self, snapshots: Vec<ThreadSnapshot>) {
        self.submit(snapshots);
    }

    /// Filter, group and queue samples
    pub(crate) fn submit(&self, snapshots: impl IntoIterator<Item = ThreadSnapshot>) {
        let batch: Vec<KeyedSnapshot> = snapshots
            .into_iter()
            .filter(|snapshot| self.accepts(snapshot))
            .map(|snapshot| {
                let key = self.config.grouper.group(&snapshot.thread_name);
                (key, snapshot)
            })
            .collect();
        self.pool.submit(batch);
    }

    fn accepts(&self, snapshot: &ThreadSnapshot) -> bool {
        if snapshot.frames.is_empty() {
            return false;
        }
        if self.config.ignore_sleeping && snapshot.state.sleeping {
            return false;
        }
        !(self.config.ignore_native && snapshot.state.in_native)
    }

    /// Current roots after every queued merge has been applied
    pub fn get_data(&self) -> HashMap<String, ThreadNode> {
        self.pool.collect()
    }

    pub fn metadata(&self) -> DataAggregatorMetadata {
        DataAggregatorMetadata {
            kind: AggregatorKind::Simple,
            thread_grouper: self.config.grouper,
            tick_length_threshold: None,
        }
    }
}
