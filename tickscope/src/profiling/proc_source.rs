//! Thread source backed by the Linux /proc filesystem
//!
//! Frames come from `/proc/<pid>/task/<tid>/stack` (kernel stack, usually
//! root-only). When that is unreadable the wait channel is used, and failing
//! that a single frame naming the run state.

use anyhow::{Context, Result};
use log::debug;
use std::fs;

use tickscope_common::{StackFrame, ThreadId, ThreadSnapshot, ThreadSource, ThreadState};

/// Class name given to kernel frames
pub const KERNEL_CLASS: &str = "kernel";
/// Class name of the fallback frame when no stack is readable
pub const USER_CLASS: &str = "[user]";

#[derive(Debug, Clone, Copy)]
pub struct ProcThreadSource {
    pid: u32,
}

impl ProcThreadSource {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    fn task_path(&self, tid: u64, file: &str) -> String {
        format!("/proc/{}/task/{}/{}", self.pid, tid, file)
    }

    /// `(tid, name)` of every thread of the process
    ///
    /// # Errors
    /// Returns an error if the task directory cannot be read
    pub fn list_threads(&self) -> Result<Vec<(ThreadId, String)>> {
        let task_dir = format!("/proc/{}/task", self.pid);
        let entries = fs::read_dir(&task_dir)
            .with_context(|| format!("Failed to read {task_dir}"))?;

        let mut threads: Vec<(ThreadId, String)> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let tid = entry.file_name().to_string_lossy().parse::<u64>().ok()?;
                let comm = fs::read_to_string(self.task_path(tid, "comm")).ok()?;
                Some((ThreadId(tid), comm.trim().to_string()))
            })
            .collect();
        threads.sort_by_key(|(id, _)| *id);
        Ok(threads)
    }

    fn read_state(&self, tid: u64) -> ThreadState {
        fs::read_to_string(self.task_path(tid, "stat"))
            .ok()
            .and_then(|stat| parse_state_char(&stat))
            .map_or(ThreadState::RUNNING, |state| ThreadState {
                sleeping: matches!(state, 'S' | 'D'),
                in_native: false,
            })
    }

    fn read_frames(&self, tid: u64, state: ThreadState) -> Vec<StackFrame> {
        if let Ok(stack) = fs::read_to_string(self.task_path(tid, "stack")) {
            let frames = parse_kernel_stack(&stack);
            if !frames.is_empty() {
                return frames;
            }
        }

        if let Ok(wchan) = fs::read_to_string(self.task_path(tid, "wchan")) {
            let wchan = wchan.trim();
            if !wchan.is_empty() && wchan != "0" {
                return vec![StackFrame::new(KERNEL_CLASS, wchan)];
            }
        }

        let method = if state.sleeping {
            "sleeping"
        } else {
            "running"
        };
        vec![StackFrame::new(USER_CLASS, method)]
    }
}

impl ThreadSource for ProcThreadSource {
    fn live_threads(&self) -> Vec<(ThreadId, String)> {
        self.list_threads().unwrap_or_else(|e| {
            debug!("Thread enumeration failed: {e:#}");
            Vec::new()
        })
    }

    fn capture(&self, id: ThreadId) -> Option<ThreadSnapshot> {
        // a missing comm file means the thread has exited
        let comm = fs::read_to_string(self.task_path(id.0, "comm")).ok()?;
        let state = self.read_state(id.0);
        let frames = self.read_frames(id.0, state);
        let snapshot = ThreadSnapshot::new(id, comm.trim(), frames);
        Some(snapshot.with_state(state))
    }
}

/// State letter of a stat line, found after the last `)`
fn parse_state_char(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// Frames of a kernel stack file, innermost first
///
/// Lines look like `[<0>] ep_poll+0x2a6/0x3d0`.
fn parse_kernel_stack(content: &str) -> Vec<StackFrame> {
    content
        .lines()
        .filter_map(|line| {
            let symbol = match line.split_once("] ") {
                Some((_, symbol)) => symbol,
                None => line,
            };
            let function = symbol.split('+').next()?.trim();
            if function.is_empty() {
                None
            } else {
                Some(StackFrame::new(KERNEL_CLASS, function))
            }
        })
        .collect()
}
