//! Domain types providing compile-time safety and self-documentation

use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sampling interval in microseconds
///
/// Every sample is weighted by the configured interval, not by the measured
/// gap between samples. Scheduling jitter is therefore not compensated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Interval(pub u64);

impl Interval {
    pub fn as_micros(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.0)
    }

    /// Time attributed to one sample
    #[allow(clippy::cast_precision_loss)]
    pub fn weight(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 && self.0 % 1000 == 0 {
            write!(f, "{}ms", self.0 / 1000)
        } else {
            write!(f, "{}µs", self.0)
        }
    }
}

/// Wall-clock timestamp in milliseconds since the unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnixMillis(pub i64);

impl UnixMillis {
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }
}

impl From<SystemTime> for UnixMillis {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self(since.as_millis() as i64),
            Err(before) => Self(-(before.duration().as_millis() as i64)),
        }
    }
}

/// How sibling frames that differ only by line number are exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Keep one child per `(class, method, line)`
    #[default]
    SeparateByLine,
    /// Merge children sharing `(class, method)`, summing their times
    CollapseByMethod,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::SeparateByLine => "separate_by_line",
            MergeMode::CollapseByMethod => "collapse_by_method",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_conversions() {
        let interval = Interval(4_000);
        assert_eq!(interval.as_duration(), Duration::from_millis(4));
        assert!((interval.weight() - 4000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interval_display() {
        assert_eq!(Interval(10_000).to_string(), "10ms");
        assert_eq!(Interval(1_500).to_string(), "1500µs");
    }

    #[test]
    fn test_unix_millis_from_system_time() {
        let time = UNIX_EPOCH + Duration::from_millis(1_234);
        assert_eq!(UnixMillis::from(time), UnixMillis(1_234));
    }

    #[test]
    fn test_merge_mode_names() {
        assert_eq!(MergeMode::default(), MergeMode::SeparateByLine);
        assert_eq!(
            MergeMode::CollapseByMethod.to_string(),
            "collapse_by_method"
        );
    }
}
