//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tickscope_common::ThreadId;

use crate::aggregator::{AggregatorConfig, ThreadGrouper};
use crate::domain::{Interval, MergeMode, SamplerError};
use crate::profiling::{SamplerSettings, ThreadDumper};
use crate::tree::ThreadNodeOrder;

#[derive(Parser, Debug)]
#[command(
    name = "tickscope",
    about = "Sample thread call stacks of a running process",
    after_help = "\
EXAMPLES:
    tickscope --pid 1234 --duration 30              Sample every thread for 30s
    tickscope --pid 1234 --thread-regex 'worker-.*' Only matching threads
    tickscope --pid 1234 --export profile.json      Write the report as JSON"
)]
pub struct Args {
    /// Process ID to sample
    #[arg(short, long)]
    pub pid: u32,

    /// Sampling interval in microseconds
    #[arg(short, long, default_value = "10000")]
    pub interval: u64,

    /// Stop after N seconds (0 = until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Only sample these thread ids (repeatable)
    #[arg(long = "thread-id", value_name = "TID", conflicts_with = "thread_regex")]
    pub thread_ids: Vec<u64>,

    /// Only sample threads whose whole name matches (repeatable, case-insensitive)
    #[arg(long = "thread-regex", value_name = "PATTERN")]
    pub thread_regex: Vec<String>,

    /// How threads are grouped into trees
    #[arg(long, value_enum, default_value_t = GroupByArg::Pool)]
    pub group_by: GroupByArg,

    /// Drop samples of sleeping threads
    #[arg(long)]
    pub ignore_sleeping: bool,

    /// How frames on different lines of the same method are exported
    #[arg(long, value_enum, default_value_t = MergeModeArg::SeparateByLine)]
    pub merge_mode: MergeModeArg,

    /// Order of thread trees in the report
    #[arg(long, value_enum, default_value_t = OrderArg::Time)]
    pub order: OrderArg,

    /// Number of merge worker threads (defaults to available cores, max 4)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Export the report to file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Free-form comment stored in the report
    #[arg(long)]
    pub comment: Option<String>,

    /// Suppress the summary printed on exit
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupByArg {
    Name,
    Pool,
    All,
}

impl From<GroupByArg> for ThreadGrouper {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::Name => ThreadGrouper::ByName,
            GroupByArg::Pool => ThreadGrouper::ByPool,
            GroupByArg::All => ThreadGrouper::AsOne,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeModeArg {
    SeparateByLine,
    CollapseByMethod,
}

impl From<MergeModeArg> for MergeMode {
    fn from(arg: MergeModeArg) -> Self {
        match arg {
            MergeModeArg::SeparateByLine => MergeMode::SeparateByLine,
            MergeModeArg::CollapseByMethod => MergeMode::CollapseByMethod,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Name,
    Time,
}

impl From<OrderArg> for ThreadNodeOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Name => ThreadNodeOrder::ByName,
            OrderArg::Time => ThreadNodeOrder::ByTime,
        }
    }
}

impl Args {
    /// Build session settings from the parsed arguments
    ///
    /// # Errors
    /// Returns an error for an invalid thread pattern or invalid sampling settings
    pub fn sampler_settings(&self) -> Result<SamplerSettings, SamplerError> {
        let thread_dumper = if !self.thread_ids.is_empty() {
            ThreadDumper::specific(self.thread_ids.iter().copied().map(ThreadId))
        } else if !self.thread_regex.is_empty() {
            ThreadDumper::regex(self.thread_regex.iter().cloned())?
        } else {
            ThreadDumper::All
        };

        let defaults = AggregatorConfig::default();
        let settings = SamplerSettings {
            aggregator: AggregatorConfig {
                interval: Interval(self.interval),
                grouper: self.group_by.into(),
                ignore_sleeping: self.ignore_sleeping,
                worker_threads: self.workers.unwrap_or(defaults.worker_threads),
                ..defaults
            },
            tick_window: None,
            thread_dumper,
            end_time: (self.duration > 0)
                .then(|| SystemTime::now() + Duration::from_secs(self.duration)),
            merge_mode: self.merge_mode.into(),
            thread_order: self.order.into(),
            comment: self.comment.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }
}
