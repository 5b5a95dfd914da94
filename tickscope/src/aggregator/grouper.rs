//! Thread grouping policies
//!
//! A grouper maps a raw thread name to the key of the call-tree root its
//! samples are merged into.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Group key used by [`ThreadGrouper::AsOne`]
pub const ALL_THREADS_KEY: &str = "All";

/// Names like `worker-3`, `pool#12` or `io--7`
const POOL_PATTERN: &str = r"^(.*?)[-#]+\d+$";

fn pool_pattern() -> &'static Regex {
    static POOL: OnceLock<Regex> = OnceLock::new();
    POOL.get_or_init(|| Regex::new(POOL_PATTERN).expect("pool pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadGrouper {
    /// One root per thread name
    ByName,
    /// Threads of one pool share a root (trailing `-N` / `#N` stripped)
    #[default]
    ByPool,
    /// Every thread shares a single root
    AsOne,
}

impl ThreadGrouper {
    /// Resolve the group key for a thread
    pub fn group(self, thread_name: &str) -> String {
        match self {
            ThreadGrouper::ByName => thread_name.to_string(),
            ThreadGrouper::ByPool => match pool_pattern().captures(thread_name) {
                Some(captures) => format!("{} (Combined)", captures[1].trim()),
                None => thread_name.to_string(),
            },
            ThreadGrouper::AsOne => ALL_THREADS_KEY.to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadGrouper::ByName => "by_name",
            ThreadGrouper::ByPool => "by_pool",
            ThreadGrouper::AsOne => "as_one",
        }
    }
}
