//! # Tickscope - Call-Stack Sampling Profiler Engine
//!
//! Tickscope periodically captures the call stacks of a host's threads,
//! merges them into per-group call trees weighted by the sampling interval,
//! and exports the result as a structured report when the session ends.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Host Process                            │
//! │              (threads exposed through ThreadSource)             │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ snapshots every interval
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Tickscope (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Sampler    │──▶│ ThreadDumper │──▶│  Aggregator  │         │
//! │  │ (tick loop)  │   │ (all/ids/re) │   │ simple/ticked│         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │         │                                     │ sharded merge   │
//! │         │                                     ▼                 │
//! │         │                              ┌──────────────┐         │
//! │         │                              │  Call Trees  │         │
//! │         │                              │ (ThreadNode) │         │
//! │         │                              └──────┬───────┘         │
//! │         ▼ stop / deadline                     │                 │
//! │  ┌──────────────┐   ┌──────────────┐          │                 │
//! │  │  Statistics  │──▶│    Export    │◀─────────┘                 │
//! │  │ (ticks,proc) │   │ (ResultSink) │                            │
//! │  └──────────────┘   └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Aggregation Modes
//!
//! ### Simple
//! Every dumped thread is merged into the tree of its group key.
//!
//! ### Ticked
//! Samples are buffered per host tick (see [`tickscope_common::TickSource`]).
//! A tick whose estimated length (`samples × interval`) is under the
//! threshold is discarded whole, so idle ticks do not dilute the profile.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Sample a running process for 30 seconds
//! tickscope --pid <PID> --duration 30 --export profile.json
//!
//! # Only threads whose name matches a pattern, collapsing line numbers
//! tickscope --pid <PID> --thread-regex 'worker-\d+' --merge-mode collapse-by-method
//! ```
//!
//! ## Key Concepts
//!
//! - **Interval**: time attributed to each captured sample, in microseconds
//! - **Group key**: the name of the tree a thread's samples merge into
//! - **Merge mode**: whether frames differing only by line stay separate
//! - **Self time**: a node's time minus the time of its children

pub mod aggregator;
pub mod cli;
pub mod domain;
pub mod export;
pub mod profiling;
pub mod stats;
pub mod tree;
