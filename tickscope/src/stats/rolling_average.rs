//! Fixed-capacity rolling window over numeric samples
//!
//! Statistics are computed on demand from a sorted copy of the window rather
//! than maintained incrementally. Queries are O(n log n) but never drift.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::MetricRecorder;

/// Point-in-time statistics of a [`RollingAverage`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub percentile95: f64,
}

/// The most recent `capacity` observations
///
/// Internally synchronized: producers on any thread may [`add`](Self::add)
/// while readers query. Queries on an empty window return `0.0`.
#[derive(Debug)]
pub struct RollingAverage {
    capacity: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl RollingAverage {
    /// A window holding at most `capacity` samples (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append an observation, evicting the oldest when full
    pub fn add(&self, value: f64) {
        let mut samples = self.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        let samples = self.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.lock().iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.lock().iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// Middle value; the mean of the two middle values for an even count
    pub fn median(&self) -> f64 {
        median_of(&self.sorted())
    }

    pub fn percentile95(&self) -> f64 {
        self.percentile(0.95)
    }

    /// Value at rank `ceil(p × count) - 1` of the sorted window
    ///
    /// `p` is a fraction in `[0, 1]`; the rank is clamped to the window.
    pub fn percentile(&self, p: f64) -> f64 {
        percentile_of(&self.sorted(), p)
    }

    /// All statistics from a single sorted copy
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> RollingSummary {
        let sorted = self.sorted();
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return RollingSummary::default();
        };
        RollingSummary {
            count: sorted.len(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min,
            max,
            median: median_of(&sorted),
            percentile95: percentile_of(&sorted, 0.95),
        }
    }

    fn sorted(&self) -> Vec<f64> {
        let mut copy: Vec<f64> = self.lock().iter().copied().collect();
        copy.sort_by(f64::total_cmp);
        copy
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricRecorder for RollingAverage {
    fn record(&self, value: f64) {
        self.add(value);
    }
}

fn median_of(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile_of(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, values: impl IntoIterator<Item = f64>) -> RollingAverage {
        let window = RollingAverage::new(capacity);
        for v in values {
            window.add(v);
        }
        window
    }

    #[test]
    fn test_empty_window_returns_zero() {
        let window = RollingAverage::new(5);
        assert!(window.is_empty());
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.min(), 0.0);
        assert_eq!(window.max(), 0.0);
        assert_eq!(window.median(), 0.0);
        assert_eq!(window.percentile95(), 0.0);
        assert_eq!(window.summary(), RollingSummary::default());
    }

    #[test]
    fn test_one_to_ten() {
        let window = filled(10, (1..=10).map(f64::from));
        assert!((window.mean() - 5.5).abs() < f64::EPSILON);
        assert!((window.median() - 5.5).abs() < f64::EPSILON);
        assert_eq!(window.percentile95(), 10.0);
        assert_eq!(window.min(), 1.0);
        assert_eq!(window.max(), 10.0);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        // capacity 3, values 100, 1, 2, 3 -> 100 evicted
        let window = filled(3, [100.0, 1.0, 2.0, 3.0]);
        assert_eq!(window.len(), 3);
        assert_eq!(window.max(), 3.0);
        assert_eq!(window.min(), 1.0);
        assert!((window.mean() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_odd_median() {
        let window = filled(5, [9.0, 1.0, 5.0]);
        assert_eq!(window.median(), 5.0);
    }

    #[test]
    fn test_percentile_single_sample() {
        let window = filled(4, [7.0]);
        assert_eq!(window.percentile95(), 7.0);
        assert_eq!(window.percentile(0.0), 7.0);
    }

    #[test]
    fn test_summary_matches_individual_queries() {
        let window = filled(8, [4.0, 8.0, 15.0, 16.0, 23.0, 42.0]);
        let summary = window.summary();
        assert_eq!(summary.count, 6);
        assert!((summary.mean - window.mean()).abs() < 1e-9);
        assert_eq!(summary.median, window.median());
        assert_eq!(summary.percentile95, window.percentile95());
        assert_eq!(summary.min, 4.0);
        assert_eq!(summary.max, 42.0);
    }

    #[test]
    fn test_record_from_many_threads() {
        let window = std::sync::Arc::new(RollingAverage::new(1_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let window = window.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        window.record(1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(window.len(), 400);
    }
}
