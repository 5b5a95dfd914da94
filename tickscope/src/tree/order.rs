//! Ordering of thread roots in an export

use serde::Serialize;
use std::cmp::Ordering;

use super::thread_node::ThreadNode;

/// Order in which thread roots appear in the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadNodeOrder {
    /// Alphabetical by group key
    ByName,
    /// Descending total time, ties broken by group key
    #[default]
    ByTime,
}

impl ThreadNodeOrder {
    pub fn compare(self, a: &(String, ThreadNode), b: &(String, ThreadNode)) -> Ordering {
        match self {
            ThreadNodeOrder::ByName => a.0.cmp(&b.0),
            ThreadNodeOrder::ByTime => {
                let by_time = b.1.time().total_cmp(&a.1.time());
                by_time.then_with(|| a.0.cmp(&b.0))
            }
        }
    }

    pub fn sort(self, roots: &mut [(String, ThreadNode)]) {
        roots.sort_by(|a, b| self.compare(a, b));
    }
}
