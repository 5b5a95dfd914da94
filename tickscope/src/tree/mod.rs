//! Call-tree model
//!
//! One [`ThreadNode`] root per group key, with [`StackTraceNode`] children
//! keyed by frame identity. Trees only grow during a session: nodes are
//! created on first sight and their time is only ever incremented.

pub mod export;
pub mod node;
pub mod order;
pub mod thread_node;

pub use export::{ExportedNode, ExportedThread};
pub use node::{ChildNodes, FrameKey, StackTraceNode};
pub use order::ThreadNodeOrder;
pub use thread_node::{ThreadNode, MAX_STACK_DEPTH};
