//! Process memory and CPU counters from /proc
//!
//! Polled once when a session ends.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

use super::StatisticsProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    /// Resident set size, kB
    pub rss_kb: u64,
    /// Peak resident set size, kB
    pub peak_rss_kb: u64,
    pub threads: u64,
    /// CPU time in user mode, clock ticks
    pub user_ticks: u64,
    /// CPU time in kernel mode, clock ticks
    pub system_ticks: u64,
}

/// Reads `/proc/<pid>/status` and `/proc/<pid>/stat`
#[derive(Debug, Clone, Copy)]
pub struct ProcessStatistics {
    pid: u32,
}

impl ProcessStatistics {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// Statistics for the current process
    pub fn current() -> Self {
        Self::new(std::process::id())
    }

    /// # Errors
    /// Returns an error if either /proc file cannot be read or parsed
    pub fn poll(&self) -> Result<ProcessSnapshot> {
        let status_path = format!("/proc/{}/status", self.pid);
        let status = fs::read_to_string(&status_path)
            .with_context(|| format!("Failed to read {status_path}"))?;
        let stat_path = format!("/proc/{}/stat", self.pid);
        let stat = fs::read_to_string(&stat_path)
            .with_context(|| format!("Failed to read {stat_path}"))?;

        let mut snapshot = parse_status(&status);
        let (user_ticks, system_ticks) = parse_stat_cpu(&stat)?;
        snapshot.user_ticks = user_ticks;
        snapshot.system_ticks = system_ticks;
        Ok(snapshot)
    }
}

impl StatisticsProvider for ProcessStatistics {
    fn name(&self) -> &str {
        "process"
    }

    fn collect(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.poll()?)?)
    }
}

/// Memory and thread counts; missing keys stay zero
fn parse_status(content: &str) -> ProcessSnapshot {
    let mut snapshot = ProcessSnapshot::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        // "VmRSS:	   10240 kB"
        let number = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok());
        match (key, number) {
            ("VmRSS", Some(n)) => snapshot.rss_kb = n,
            ("VmHWM", Some(n)) => snapshot.peak_rss_kb = n,
            ("Threads", Some(n)) => snapshot.threads = n,
            _ => {}
        }
    }
    snapshot
}

/// `(utime, stime)` from a stat line
///
/// The command name may contain spaces or parentheses, so fields are counted
/// from the last `)`.
fn parse_stat_cpu(content: &str) -> Result<(u64, u64)> {
    let (_, rest) = content
        .rsplit_once(')')
        .context("Malformed stat line: no command name")?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); utime is field 14, stime field 15
    let utime = fields
        .get(11)
        .context("Malformed stat line: missing utime")?
        .parse()?;
    let stime = fields
        .get(12)
        .context("Malformed stat line: missing stime")?
        .parse()?;
    Ok((utime, stime))
}
