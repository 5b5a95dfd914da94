//! Report export
//!
//! This module defines the end-of-session document and how it is handed off:
//! [`SamplerReport`] is the document, [`ResultSink`] the delivery seam, and
//! [`JsonFileSink`] the bundled JSON file writer.

pub mod class_source;
pub mod report;
pub mod sink;

pub use class_source::{ClassSourceLookup, ClassSourceVisitor, PrefixLookup};
pub use report::{SamplerMetadata, SamplerReport};
pub use sink::{CallbackSink, JsonExporter, JsonFileSink, ResultSink};
