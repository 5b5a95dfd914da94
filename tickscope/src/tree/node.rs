//! Call-tree nodes below a thread root
//!
//! Children are stored in a `Vec` in first-seen order with a side index from
//! [`FrameKey`] to position. The order matters only for export: equal-time
//! siblings keep the order in which they were first sampled.

use std::collections::HashMap;
use std::slice;

use tickscope_common::StackFrame;

/// Identity of a child node under its parent
///
/// The line number is always part of the stored identity; collapsing by
/// method happens at export time (see [`MergeMode`](crate::domain::MergeMode)).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub class_name: String,
    pub method_name: String,
    pub line: Option<u32>,
}

impl From<&StackFrame> for FrameKey {
    fn from(frame: &StackFrame) -> Self {
        Self {
            class_name: frame.class_name.clone(),
            method_name: frame.method_name.clone(),
            line: frame.line,
        }
    }
}

/// Accumulated time at one call-stack position
#[derive(Debug, Clone)]
pub struct StackTraceNode {
    key: FrameKey,
    time: f64,
    children: ChildNodes,
}

impl StackTraceNode {
    fn new(key: FrameKey) -> Self {
        Self {
            key,
            time: 0.0,
            children: ChildNodes::default(),
        }
    }

    pub fn key(&self) -> &FrameKey {
        &self.key
    }

    /// Total time of every sample whose stack passed through this node
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn children(&self) -> &ChildNodes {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut ChildNodes {
        &mut self.children
    }

    pub(crate) fn add_time(&mut self, time: f64) {
        self.time += time;
    }
}

/// Children of a node, unique by [`FrameKey`]
#[derive(Debug, Clone, Default)]
pub struct ChildNodes {
    nodes: Vec<StackTraceNode>,
    index: HashMap<FrameKey, usize>,
}

impl ChildNodes {
    /// Fetch the child for `frame`, creating it on first sight
    pub(crate) fn resolve(&mut self, frame: &StackFrame) -> &mut StackTraceNode {
        let key = FrameKey::from(frame);
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                let position = self.nodes.len();
                self.index.insert(key.clone(), position);
                self.nodes.push(StackTraceNode::new(key));
                position
            }
        };
        &mut self.nodes[position]
    }

    pub fn get(&self, key: &FrameKey) -> Option<&StackTraceNode> {
        self.index.get(key).map(|&position| &self.nodes[position])
    }

    /// Look up a child by method, ignoring line numbers
    ///
    /// Returns the first-seen match when several lines exist.
    pub fn find_method(&self, class_name: &str, method_name: &str) -> Option<&StackTraceNode> {
        self.nodes
            .iter()
            .find(|node| {
                node.key.class_name == class_name && node.key.method_name == method_name
            })
    }

    pub fn iter(&self) -> slice::Iter<'_, StackTraceNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of the direct children's times
    pub fn total_time(&self) -> f64 {
        self.nodes.iter().map(StackTraceNode::time).sum()
    }
}

impl<'a> IntoIterator for &'a ChildNodes {
    type Item = &'a StackTraceNode;
    type IntoIter = slice::Iter<'a, StackTraceNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_collapses_identical_keys() {
        let mut children = ChildNodes::default();
        let frame = StackFrame::new("app", "run").with_line(3);

        children.resolve(&frame).add_time(1.0);
        children.resolve(&frame).add_time(2.0);

        assert_eq!(children.len(), 1);
        let node = children.get(&FrameKey::from(&frame)).unwrap();
        assert!((node.time() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_keeps_lines_distinct() {
        let mut children = ChildNodes::default();
        children.resolve(&StackFrame::new("app", "run").with_line(3));
        children.resolve(&StackFrame::new("app", "run").with_line(9));
        children.resolve(&StackFrame::new("app", "run"));

        assert_eq!(children.len(), 3);
        let first = children.find_method("app", "run").unwrap();
        assert_eq!(first.key().line, Some(3));
    }

    #[test]
    fn test_children_keep_first_seen_order() {
        let mut children = ChildNodes::default();
        for method in ["c", "a", "b", "a"] {
            children.resolve(&StackFrame::new("app", method));
        }

        let order: Vec<&str> = children.iter().map(|n| n.key().method_name.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
