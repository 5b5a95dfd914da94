//! # Sampling Session Driver
//!
//! Owns the fixed-rate sampling loop and the session lifecycle.
//!
//! ```text
//!   start() ──► sampling thread ──┬─► ThreadDumper::dump()
//!                 (crossbeam tick)│        │
//!                                 │        ▼
//!                                 │   DataAggregator::insert_data()
//!                                 │
//!   stop() ──► stop signal ───────┘
//!   or deadline                    └─► finish(): get_data → order → export
//!                                        → ResultSink → CompletionCell
//! ```
//!
//! Intervals are nominal. Each sample is weighted by the configured interval,
//! so late ticks caused by scheduling pauses are not compensated for.

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use tickscope_common::{ThreadSource, TickSource};

use super::completion::CompletionCell;
use super::thread_dumper::ThreadDumper;
use crate::aggregator::{
    AggregatorConfig, DataAggregator, SimpleDataAggregator, TickedDataAggregator,
};
use crate::domain::{MergeMode, SamplerError, UnixMillis};
use crate::export::{
    ClassSourceLookup, ClassSourceVisitor, ResultSink, SamplerMetadata, SamplerReport,
};
use crate::stats::StatisticsProvider;
use crate::tree::{ExportedThread, ThreadNode, ThreadNodeOrder};

/// Tick-windowed aggregation settings
#[derive(Clone)]
pub struct TickWindow {
    pub source: Arc<dyn TickSource>,
    /// Ticks estimated shorter than this are discarded, in milliseconds
    pub threshold_ms: u64,
}

/// Everything needed to run one session
#[derive(Clone)]
pub struct SamplerSettings {
    pub aggregator: AggregatorConfig,
    /// `Some` selects the ticked aggregator
    pub tick_window: Option<TickWindow>,
    pub thread_dumper: ThreadDumper,
    /// Absolute deadline; `None` runs until stopped
    pub end_time: Option<SystemTime>,
    pub merge_mode: MergeMode,
    pub thread_order: ThreadNodeOrder,
    pub comment: Option<String>,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            tick_window: None,
            thread_dumper: ThreadDumper::All,
            end_time: None,
            merge_mode: MergeMode::default(),
            thread_order: ThreadNodeOrder::default(),
            comment: None,
        }
    }
}

impl SamplerSettings {
    /// # Errors
    /// Returns [`SamplerError::InvalidConfig`] if the aggregator settings are invalid
    pub fn validate(&self) -> Result<(), SamplerError> {
        self.aggregator.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called
    Stopped,
    /// The configured end time passed
    DeadlineReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stopped => f.write_str("stopped"),
            StopReason::DeadlineReached => f.write_str("deadline reached"),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct Completion {
    pub reason: StopReason,
    pub report: Arc<SamplerReport>,
}

/// Builds a [`Sampler`] with its optional collaborators
pub struct SamplerBuilder {
    settings: SamplerSettings,
    thread_source: Arc<dyn ThreadSource>,
    sink: Option<Box<dyn ResultSink>>,
    statistics: Vec<Arc<dyn StatisticsProvider>>,
    class_source: Option<Arc<dyn ClassSourceLookup>>,
}

impl SamplerBuilder {
    pub fn new(settings: SamplerSettings, thread_source: Arc<dyn ThreadSource>) -> Self {
        Self {
            settings,
            thread_source,
            sink: None,
            statistics: Vec::new(),
            class_source: None,
        }
    }

    #[must_use]
    pub fn sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn statistics(mut self, provider: Arc<dyn StatisticsProvider>) -> Self {
        self.statistics.push(provider);
        self
    }

    #[must_use]
    pub fn class_source(mut self, lookup: Arc<dyn ClassSourceLookup>) -> Self {
        self.class_source = Some(lookup);
        self
    }

    /// Validate settings and start the aggregator's merge pool
    ///
    /// Sampling itself begins with [`Sampler::start`].
    ///
    /// # Errors
    /// Returns an error if the settings are invalid or a merge thread cannot
    /// be spawned
    pub fn build(self) -> Result<Sampler, SamplerError> {
        let settings = self.settings;
        settings.validate()?;

        let aggregator: DataAggregator = match settings.tick_window {
            None => SimpleDataAggregator::new(settings.aggregator)?.into(),
            Some(window) => {
                let ticked = TickedDataAggregator::new(
                    settings.aggregator,
                    window.source,
                    window.threshold_ms,
                )?;
                ticked.into()
            }
        };

        Ok(Sampler {
            session: Arc::new(Session {
                thread_source: self.thread_source,
                thread_dumper: settings.thread_dumper,
                aggregator,
                end_time: settings.end_time,
                merge_mode: settings.merge_mode,
                thread_order: settings.thread_order,
                comment: settings.comment,
                statistics: self.statistics,
                class_source: self.class_source,
                sink: Mutex::new(self.sink),
                start_time: OnceLock::new(),
                finished: AtomicBool::new(false),
                completion: CompletionCell::new(),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }
}

enum Lifecycle {
    Idle,
    Running {
        stop_tx: Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// State shared with the sampling thread
struct Session {
    thread_source: Arc<dyn ThreadSource>,
    thread_dumper: ThreadDumper,
    aggregator: DataAggregator,
    end_time: Option<SystemTime>,
    merge_mode: MergeMode,
    thread_order: ThreadNodeOrder,
    comment: Option<String>,
    statistics: Vec<Arc<dyn StatisticsProvider>>,
    class_source: Option<Arc<dyn ClassSourceLookup>>,
    sink: Mutex<Option<Box<dyn ResultSink>>>,
    start_time: OnceLock<UnixMillis>,
    finished: AtomicBool,
    completion: CompletionCell<Completion>,
}

/// A bounded sampling session
///
/// A sampler runs at most once: `start` → (`stop` | deadline) → completed.
pub struct Sampler {
    session: Arc<Session>,
    lifecycle: Mutex<Lifecycle>,
}

impl Sampler {
    /// Begin sampling on a dedicated thread
    ///
    /// # Errors
    /// [`SamplerError::AlreadyStarted`] if this sampler was started before
    pub fn start(&self) -> Result<(), SamplerError> {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(SamplerError::AlreadyStarted);
        }

        let start_time = UnixMillis::now();
        // only reachable from Idle, so the cell is still empty
        let _ = self.session.start_time.set(start_time);

        let (stop_tx, stop_rx) = bounded(1);
        let session = Arc::clone(&self.session);
        let name = "tickscope-sampler".to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || session.run(&stop_rx))
            .map_err(|error| SamplerError::SpawnFailed { name, error })?;

        *lifecycle = Lifecycle::Running { stop_tx, handle };
        info!(
            "Sampling started: interval {}, dumper {:?}, aggregator {:?}",
            self.session.aggregator.interval(),
            self.session.thread_dumper.metadata(),
            self.session.aggregator.metadata().kind
        );
        Ok(())
    }

    /// Stop sampling and return the session's completion
    ///
    /// Calling `stop` again, or after the deadline already completed the
    /// session, returns the same completion.
    ///
    /// # Errors
    /// [`SamplerError::NotStarted`] if the sampler was never started
    pub fn stop(&self) -> Result<Completion, SamplerError> {
        let running = {
            let mut lifecycle = self.lifecycle();
            match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Idle => {
                    *lifecycle = Lifecycle::Idle;
                    return Err(SamplerError::NotStarted);
                }
                Lifecycle::Running { stop_tx, handle } => Some((stop_tx, handle)),
                Lifecycle::Stopped => None,
            }
        };

        if let Some((stop_tx, handle)) = running {
            // fails if the loop already exited on its deadline
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                warn!("Sampling thread panicked");
            }
            self.session.finish(StopReason::Stopped);
        }

        Ok(self.session.completion.wait())
    }

    /// Block until the session completes
    ///
    /// Only returns for a started session that reaches its deadline or is
    /// stopped from another thread.
    pub fn wait(&self) -> Completion {
        self.session.completion.wait()
    }

    /// The completion, if the session has finished
    pub fn completion(&self) -> Option<Completion> {
        self.session.completion.get()
    }

    /// # Errors
    /// [`SamplerError::NotStarted`] if the sampler was never started
    pub fn start_time(&self) -> Result<UnixMillis, SamplerError> {
        self.session
            .start_time
            .get()
            .copied()
            .ok_or(SamplerError::NotStarted)
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.session.end_time
    }

    pub fn is_running(&self) -> bool {
        let running = matches!(*self.lifecycle(), Lifecycle::Running { .. });
        running && !self.session.completion.is_complete()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        let lifecycle = mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        if let Lifecycle::Running { stop_tx, handle } = lifecycle {
            let _ = stop_tx.send(());
            let _ = handle.join();
        }
    }
}

impl Session {
    fn run(&self, stop_rx: &Receiver<()>) {
        let ticker = tick(self.aggregator.interval().as_duration());
        loop {
            select! {
                recv(stop_rx) -> _ => return,
                recv(ticker) -> _ => {
                    if self.deadline_reached() {
                        self.finish(StopReason::DeadlineReached);
                        return;
                    }
                    let snapshots = self.thread_dumper.dump(self.thread_source.as_ref());
                    self.aggregator.insert_data(snapshots);
                }
            }
        }
    }

    fn deadline_reached(&self) -> bool {
        self.end_time.is_some_and(|end| SystemTime::now() >= end)
    }

    /// Build the report, deliver it and fulfil the completion, once
    fn finish(&self, reason: StopReason) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }

        let report = Arc::new(self.build_report());
        info!("Sampling {reason}: {} thread groups", report.threads.len());

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.deliver(&report) {
                warn!("Failed to deliver sampler report: {e:#}");
            }
        }

        self.completion.complete(Completion { reason, report });
    }

    fn build_report(&self) -> SamplerReport {
        let mut roots: Vec<(String, ThreadNode)> = self.aggregator.get_data().into_iter().collect();
        self.thread_order.sort(&mut roots);
        let threads: Vec<ExportedThread> = roots
            .iter()
            .map(|(_, root)| root.export(self.merge_mode))
            .collect();

        let class_sources = match &self.class_source {
            Some(lookup) => {
                let mut visitor = ClassSourceVisitor::new(lookup.as_ref());
                for thread in &threads {
                    visitor.visit(thread);
                }
                visitor.into_mapping()
            }
            None => BTreeMap::new(),
        };

        let mut statistics = BTreeMap::new();
        for provider in &self.statistics {
            match provider.collect() {
                Ok(block) => {
                    statistics.insert(provider.name().to_string(), block);
                }
                Err(e) => warn!("Failed to collect {} statistics: {e:#}", provider.name()),
            }
        }
        debug!("Collected {} statistics blocks", statistics.len());

        SamplerReport {
            metadata: SamplerMetadata {
                start_time: *self.start_time.get_or_init(UnixMillis::now),
                end_time: self.end_time.map(UnixMillis::from),
                stop_time: UnixMillis::now(),
                interval: self.aggregator.interval(),
                thread_dumper: self.thread_dumper.metadata(),
                data_aggregator: self.aggregator.metadata(),
                merge_mode: self.merge_mode,
                thread_order: self.thread_order,
                comment: self.comment.clone(),
                statistics,
            },
            threads,
            class_sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tickscope_common::{StackFrame, ThreadId, ThreadSnapshot};

    struct OneThread;

    impl ThreadSource for OneThread {
        fn live_threads(&self) -> Vec<(ThreadId, String)> {
            vec![(ThreadId(1), "main".to_string())]
        }

        fn capture(&self, id: ThreadId) -> Option<ThreadSnapshot> {
            Some(ThreadSnapshot::new(id, "main", vec![StackFrame::new("app", "spin")]))
        }
    }

    fn sampler(settings: SamplerSettings) -> Sampler {
        SamplerBuilder::new(settings, Arc::new(OneThread))
            .build()
            .unwrap()
    }

    fn fast_settings() -> SamplerSettings {
        SamplerSettings {
            aggregator: AggregatorConfig {
                interval: crate::domain::Interval(1_000),
                worker_threads: 1,
                ..AggregatorConfig::default()
            },
            ..SamplerSettings::default()
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let sampler = sampler(fast_settings());
        sampler.start().unwrap();
        assert!(matches!(sampler.start(), Err(SamplerError::AlreadyStarted)));
        sampler.stop().unwrap();
    }

    #[test]
    fn test_stop_before_start_fails() {
        let sampler = sampler(fast_settings());
        assert!(matches!(sampler.stop(), Err(SamplerError::NotStarted)));
        assert!(matches!(sampler.start_time(), Err(SamplerError::NotStarted)));
        // still startable afterwards
        sampler.start().unwrap();
        sampler.stop().unwrap();
    }

    #[test]
    fn test_stop_twice_returns_same_completion() {
        let sampler = sampler(fast_settings());
        sampler.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        let first = sampler.stop().unwrap();
        let second = sampler.stop().unwrap();
        assert_eq!(first.reason, StopReason::Stopped);
        assert!(Arc::ptr_eq(&first.report, &second.report));
        assert!(matches!(sampler.start(), Err(SamplerError::AlreadyStarted)));
    }

    #[test]
    fn test_deadline_completes_session() {
        let settings = SamplerSettings {
            end_time: Some(SystemTime::now() + Duration::from_millis(30)),
            ..fast_settings()
        };
        let sampler = sampler(settings);
        sampler.start().unwrap();

        let completion = sampler.wait();
        assert_eq!(completion.reason, StopReason::DeadlineReached);
        assert!(!sampler.is_running());

        let stopped = sampler.stop().unwrap();
        assert_eq!(stopped.reason, StopReason::DeadlineReached);
        assert!(Arc::ptr_eq(&completion.report, &stopped.report));
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let mut settings = fast_settings();
        settings.aggregator.interval = crate::domain::Interval(0);
        let result = SamplerBuilder::new(settings, Arc::new(OneThread)).build();
        assert!(matches!(result, Err(SamplerError::InvalidConfig(_))));
    }
}
