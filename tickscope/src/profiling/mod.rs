//! Profiling core modules
//!
//! - Thread selection policies ([`ThreadDumper`])
//! - The `/proc` backed thread source
//! - The sampling session driver ([`Sampler`])

pub mod completion;
pub mod proc_source;
pub mod sampler;
pub mod thread_dumper;

pub use completion::CompletionCell;
pub use proc_source::ProcThreadSource;
pub use sampler::{
    Completion, Sampler, SamplerBuilder, SamplerSettings, StopReason, TickWindow,
};
pub use thread_dumper::{NamePatterns, ThreadDumper, ThreadDumperMetadata};
