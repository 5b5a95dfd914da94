//! The structured document produced at the end of a session

use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregator::DataAggregatorMetadata;
use crate::domain::{Interval, MergeMode, UnixMillis};
use crate::profiling::ThreadDumperMetadata;
use crate::tree::{ExportedThread, ThreadNodeOrder};

/// Session settings and end-of-session statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerMetadata {
    pub start_time: UnixMillis,
    /// Configured deadline, absent for an unbounded session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<UnixMillis>,
    /// When sampling actually stopped
    pub stop_time: UnixMillis,
    pub interval: Interval,
    pub thread_dumper: ThreadDumperMetadata,
    pub data_aggregator: DataAggregatorMetadata,
    pub merge_mode: MergeMode,
    pub thread_order: ThreadNodeOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// One block per statistics provider that succeeded
    pub statistics: BTreeMap<String, serde_json::Value>,
}

/// Ordered, merged call trees plus metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerReport {
    pub metadata: SamplerMetadata,
    pub threads: Vec<ExportedThread>,
    /// Class → originating module, from the configured class source lookup
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub class_sources: BTreeMap<String, String>,
}

impl SamplerReport {
    pub fn thread(&self, name: &str) -> Option<&ExportedThread> {
        self.threads.iter().find(|t| t.name == name)
    }
}
