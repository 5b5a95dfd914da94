//! Tick-windowed aggregator
//!
//! Samples are buffered per tick of the host's work cycle. When the tick
//! changes, the finished buffer's length is estimated as
//! `samples × interval`; buffers shorter than the threshold are discarded,
//! the rest are handed to the base aggregator. This keeps near-instant idle
//! cycles from dominating the result.

use log::debug;
use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tickscope_common::{ThreadSnapshot, TickSource};

use super::simple::SimpleDataAggregator;
use super::{AggregatorConfig, AggregatorKind, DataAggregatorMetadata};
use crate::domain::{Interval, SamplerError};
use crate::tree::ThreadNode;

/// Nominal tick length used to pre-size buffers, in microseconds
const EXPECTED_TICK_MICROS: u64 = 50_000;

/// Samples collected during one tick
struct TickBuffer {
    tick: i64,
    samples: Vec<ThreadSnapshot>,
}

pub struct TickedDataAggregator {
    base: SimpleDataAggregator,
    tick_source: Arc<dyn TickSource>,
    /// Tick durations under this are discarded, in microseconds
    tick_length_threshold: u64,
    expected_size: usize,
    current: Mutex<TickBuffer>,
}

impl TickedDataAggregator {
    /// # Errors
    /// Returns an error if the base aggregator cannot be started
    pub fn new(
        config: AggregatorConfig,
        tick_source: Arc<dyn TickSource>,
        tick_length_threshold_ms: u64,
    ) -> Result<Self, SamplerError> {
        let base = SimpleDataAggregator::new(config)?;
        // a bit of headroom over the nominal tick
        #[allow(clippy::cast_possible_truncation)]
        let expected_size = (EXPECTED_TICK_MICROS / base.interval().as_micros()) as usize + 10;

        Ok(Self {
            base,
            tick_source,
            tick_length_threshold: tick_length_threshold_ms.saturating_mul(1_000),
            expected_size,
            current: Mutex::new(TickBuffer {
                tick: -1,
                samples: Vec::new(),
            }),
        })
    }

    pub fn interval(&self) -> Interval {
        self.base.interval()
    }

    pub fn tick_length_threshold_micros(&self) -> u64 {
        self.tick_length_threshold
    }

    /// Buffer the threads of one dump under the current tick
    ///
    /// The tick is polled once per call; if it moved since the last call the
    /// previous tick's buffer is closed first. Closed buffers are forwarded
    /// while the buffer lock is held, so a concurrent [`get_data`](Self::get_data)
    /// always sees every insert that returned before it.
    pub fn insert_data(&self, snapshots: Vec<ThreadSnapshot>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let tick = self.tick_source.current_tick();
        if current.tick != tick {
            let fresh = TickBuffer {
                tick,
                samples: Vec::with_capacity(self.expected_size),
            };
            let finished = mem::replace(&mut *current, fresh);
            self.push(finished);
        }
        current.samples.extend(snapshots);
    }

    /// Forward a closed buffer unless it was too short
    fn push(&self, buffer: TickBuffer) {
        let estimated = buffer.samples.len() as u64 * self.base.interval().as_micros();
        if estimated < self.tick_length_threshold {
            if !buffer.samples.is_empty() {
                debug!(
                    "Discarding tick {} ({} samples, ~{estimated}µs < {}µs)",
                    buffer.tick,
                    buffer.samples.len(),
                    self.tick_length_threshold
                );
            }
            return;
        }
        self.base.submit(buffer.samples);
    }

    /// Close the open tick, then read the base aggregator's roots
    ///
    /// The open buffer is handled as if a tick boundary had occurred, and is
    /// replaced by an empty one for the same tick so it is never forwarded
    /// twice.
    pub fn get_data(&self) -> HashMap<String, ThreadNode> {
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let open = TickBuffer {
                tick: current.tick,
                samples: Vec::new(),
            };
            let open = mem::replace(&mut *current, open);
            self.push(open);
        }

        self.base.get_data()
    }

    pub fn metadata(&self) -> DataAggregatorMetadata {
        DataAggregatorMetadata {
            kind: AggregatorKind::Ticked,
            thread_grouper: self.base.config().grouper,
            tick_length_threshold: Some(self.tick_length_threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ThreadGrouper;
    use crate::stats::TickCounter;
    use tickscope_common::{StackFrame, ThreadId};

    fn sample(method: &str) -> Vec<ThreadSnapshot> {
        let frames = vec![StackFrame::new("app", method)];
        vec![ThreadSnapshot::new(ThreadId(1), "server", frames)]
    }

    fn ticked(threshold_ms: u64) -> (TickedDataAggregator, Arc<TickCounter>) {
        let ticks = Arc::new(TickCounter::new());
        let config = AggregatorConfig {
            interval: Interval(10_000),
            grouper: ThreadGrouper::ByName,
            worker_threads: 1,
            ..AggregatorConfig::default()
        };
        let agg = TickedDataAggregator::new(config, ticks.clone(), threshold_ms)
            .expect("Failed to create aggregator");
        (agg, ticks)
    }

    #[test]
    fn test_short_tick_is_discarded() {
        // 2 samples x 10ms = 20ms < 25ms
        let (agg, ticks) = ticked(25);
        agg.insert_data(sample("idle"));
        agg.insert_data(sample("idle"));
        ticks.advance();
        // 3 samples x 10ms = 30ms >= 25ms
        agg.insert_data(sample("work"));
        agg.insert_data(sample("work"));
        agg.insert_data(sample("work"));
        ticks.advance();
        agg.insert_data(sample("next"));

        let data = agg.get_data();
        let server = &data["server"];
        assert!(server.children().find_method("app", "idle").is_none());
        let work = server.children().find_method("app", "work").unwrap();
        assert!((work.time() - 30_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_data_flushes_open_tick() {
        let (agg, _ticks) = ticked(20);
        agg.insert_data(sample("work"));
        agg.insert_data(sample("work"));

        let data = agg.get_data();
        assert!((data["server"].time() - 20_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_data_twice_does_not_double_count() {
        let (agg, ticks) = ticked(0);
        agg.insert_data(sample("work"));
        let first = agg.get_data();
        ticks.advance();
        agg.insert_data(sample("work"));
        let second = agg.get_data();

        assert!((first["server"].time() - 10_000.0).abs() < f64::EPSILON);
        assert!((second["server"].time() - 20_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_get_data_sees_every_returned_insert() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        const INSERTS: usize = 5_000;

        let (agg, ticks) = ticked(0);
        let agg = Arc::new(agg);
        let done = Arc::new(AtomicUsize::new(0));

        let writer = {
            let (agg, done) = (agg.clone(), done.clone());
            thread::spawn(move || {
                for _ in 0..INSERTS {
                    ticks.advance();
                    agg.insert_data(sample("work"));
                    done.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        while done.load(Ordering::SeqCst) < INSERTS {
            let returned = done.load(Ordering::SeqCst);
            let data = agg.get_data();
            let seen = data.get("server").map_or(0.0, ThreadNode::time);
            #[allow(clippy::cast_precision_loss)]
            let expected = returned as f64 * 10_000.0;
            assert!(
                seen >= expected,
                "saw {seen} after {returned} completed inserts"
            );
        }
        writer.join().unwrap();

        #[allow(clippy::cast_precision_loss)]
        let total = INSERTS as f64 * 10_000.0;
        let data = agg.get_data();
        assert!((data["server"].time() - total).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_is_converted_to_micros() {
        let (agg, _ticks) = ticked(5);
        assert_eq!(agg.tick_length_threshold_micros(), 5_000);
        assert_eq!(agg.metadata().tick_length_threshold, Some(5_000));
    }
}
