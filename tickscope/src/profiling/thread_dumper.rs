//! Thread selection policies
//!
//! A [`ThreadDumper`] decides which threads are captured on each sampling
//! tick. Threads that exit between enumeration and capture are skipped.

use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use std::collections::BTreeSet;

use tickscope_common::{ThreadId, ThreadSnapshot, ThreadSource};

use crate::domain::SamplerError;

#[derive(Debug, Clone)]
pub enum ThreadDumper {
    /// Every live thread
    All,
    /// Only these thread ids
    Specific(BTreeSet<ThreadId>),
    /// Live threads whose name fully matches any pattern, case-insensitively
    Regex(NamePatterns),
}

/// Compiled thread-name patterns, keeping their source text for metadata
#[derive(Debug, Clone)]
pub struct NamePatterns {
    sources: Vec<String>,
    set: RegexSet,
}

impl NamePatterns {
    /// # Errors
    /// Returns [`SamplerError::InvalidPattern`] if any pattern fails to compile
    pub fn new<I, S>(patterns: I) -> Result<Self, SamplerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = RegexSetBuilder::new(sources.iter().map(|p| format!("^(?:{p})$")))
            .case_insensitive(true)
            .build()?;
        Ok(Self { sources, set })
    }

    pub fn is_match(&self, thread_name: &str) -> bool {
        self.set.is_match(thread_name)
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

impl ThreadDumper {
    pub fn specific(ids: impl IntoIterator<Item = ThreadId>) -> Self {
        ThreadDumper::Specific(ids.into_iter().collect())
    }

    /// # Errors
    /// Returns [`SamplerError::InvalidPattern`] if any pattern fails to compile
    pub fn regex<I, S>(patterns: I) -> Result<Self, SamplerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(ThreadDumper::Regex(NamePatterns::new(patterns)?))
    }

    /// Capture the selected threads
    ///
    /// For [`ThreadDumper::Regex`] the live thread list is re-read on every
    /// call, so threads started mid-session are picked up.
    pub fn dump(&self, source: &dyn ThreadSource) -> Vec<ThreadSnapshot> {
        match self {
            ThreadDumper::All => source
                .live_threads()
                .into_iter()
                .filter_map(|(id, _)| source.capture(id))
                .collect(),
            ThreadDumper::Specific(ids) => ids
                .iter()
                .filter_map(|&id| source.capture(id))
                .collect(),
            ThreadDumper::Regex(patterns) => source
                .live_threads()
                .into_iter()
                .filter(|(_, name)| patterns.is_match(name))
                .filter_map(|(id, _)| source.capture(id))
                .collect(),
        }
    }

    pub fn metadata(&self) -> ThreadDumperMetadata {
        match self {
            ThreadDumper::All => ThreadDumperMetadata::All,
            ThreadDumper::Specific(ids) => ThreadDumperMetadata::Specific {
                ids: ids.iter().map(|id| id.0).collect(),
            },
            ThreadDumper::Regex(patterns) => ThreadDumperMetadata::Regex {
                patterns: patterns.sources().to_vec(),
            },
        }
    }
}

/// Describes a dumper in the exported report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadDumperMetadata {
    All,
    Specific { ids: Vec<u64> },
    Regex { patterns: Vec<String> },
}
