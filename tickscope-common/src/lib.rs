//! # Shared Data Structures (Host ↔ Engine)
//!
//! Defines the data a host process hands to the sampling engine, and the two
//! collaborator traits the engine calls back into. Nothing here depends on the
//! engine itself, so a host can implement [`ThreadSource`] or [`TickSource`]
//! without pulling in the aggregator or its worker pool.
//!
//! ## Key Types
//!
//! - [`ThreadSnapshot`] - One thread's captured stack at a sampling instant
//! - [`StackFrame`] - One call frame (class, method, optional line)
//! - [`ThreadState`] - Flags used by the sleeping/native sample filters
//! - [`ThreadSource`] - Enumerates and captures live threads
//! - [`TickSource`] - Reports the host's current work cycle

use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Thread ID as assigned by the host (kernel TID, runtime thread id, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

// ============================================================================
// Snapshot Data
// ============================================================================

/// Run state captured alongside a stack
///
/// Both flags default to `false`, meaning the sample is always kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadState {
    /// Thread was parked, waiting or sleeping when captured
    pub sleeping: bool,
    /// Thread was executing native (non-managed) code when captured
    pub in_native: bool,
}

impl ThreadState {
    pub const RUNNING: Self = Self {
        sleeping: false,
        in_native: false,
    };
    pub const SLEEPING: Self = Self {
        sleeping: true,
        in_native: false,
    };
    pub const NATIVE: Self = Self {
        sleeping: false,
        in_native: true,
    };
}

/// A single call frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackFrame {
    /// Owning class, module or namespace (e.g. `"kernel"`, `"app::net"`)
    pub class_name: String,
    /// Method or function name
    pub method_name: String,
    /// Line currently executing in this frame, if known
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            line: None,
        }
    }

    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}.{}:{}", self.class_name, self.method_name, line),
            None => write!(f, "{}.{}", self.class_name, self.method_name),
        }
    }
}

/// One thread's state at a sampling instant
///
/// `frames` is ordered innermost first: `frames[0]` is the executing frame,
/// the last element is the thread's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadSnapshot {
    pub thread_id: ThreadId,
    pub thread_name: String,
    pub frames: Vec<StackFrame>,
    pub state: ThreadState,
}

impl ThreadSnapshot {
    pub fn new(
        thread_id: ThreadId,
        thread_name: impl Into<String>,
        frames: Vec<StackFrame>,
    ) -> Self {
        Self {
            thread_id,
            thread_name: thread_name.into(),
            frames,
            state: ThreadState::RUNNING,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: ThreadState) -> Self {
        self.state = state;
        self
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Access to the live threads of the profiled process
///
/// Implementations must tolerate threads exiting between [`live_threads`]
/// and [`capture`]; a vanished thread is reported as `None`, never as an error.
///
/// [`live_threads`]: ThreadSource::live_threads
/// [`capture`]: ThreadSource::capture
pub trait ThreadSource: Send + Sync {
    /// Every live thread as `(id, name)`
    fn live_threads(&self) -> Vec<(ThreadId, String)>;

    /// Capture the stack of one thread, or `None` if it is gone
    fn capture(&self, id: ThreadId) -> Option<ThreadSnapshot>;
}

/// Reports the host's current work cycle ("tick")
///
/// The value must never decrease. It is polled once per insertion by the
/// ticked aggregator.
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_display() {
        assert_eq!(ThreadId(42).to_string(), "TID:42");
    }

    #[test]
    fn test_stack_frame_display() {
        assert_eq!(StackFrame::new("app", "run").to_string(), "app.run");
        assert_eq!(
            StackFrame::new("app", "run").with_line(7).to_string(),
            "app.run:7"
        );
    }

    #[test]
    fn test_snapshot_defaults_to_running() {
        let frames = vec![StackFrame::new("a", "b")];
        let snapshot = ThreadSnapshot::new(ThreadId(1), "main", frames);
        assert_eq!(snapshot.state, ThreadState::RUNNING);
        assert_eq!(snapshot.frames[0].method_name, "b");
    }
}
