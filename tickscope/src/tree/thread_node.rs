//! Thread-group roots of the call tree

use tickscope_common::StackFrame;

use super::node::ChildNodes;

/// Maximum number of frames merged per sample
///
/// Deeper stacks keep their outermost frames, so the tree stays rooted at the
/// thread's entry point.
pub const MAX_STACK_DEPTH: usize = 300;

/// Root of one call tree, filed under a group key
#[derive(Debug, Clone)]
pub struct ThreadNode {
    name: String,
    time: f64,
    children: ChildNodes,
}

impl ThreadNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: 0.0,
            children: ChildNodes::default(),
        }
    }

    /// The group key this root is filed under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total time of every sample merged into this root
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn children(&self) -> &ChildNodes {
        &self.children
    }

    /// Merge one sample into the tree
    ///
    /// `frames` is innermost first. `time` is added to the root and to every
    /// node on the path from the outermost frame down to the innermost one,
    /// so the innermost frame's share of `time` is entirely self time.
    /// An empty stack is ignored.
    pub fn log(&mut self, frames: &[StackFrame], time: f64) {
        if frames.is_empty() {
            return;
        }
        self.time += time;

        let mut children = &mut self.children;
        for frame in frames.iter().rev().take(MAX_STACK_DEPTH) {
            let node = children.resolve(frame);
            node.add_time(time);
            children = node.children_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FrameKey;

    fn stack(methods: &[&str]) -> Vec<StackFrame> {
        // innermost first, like a captured stack
        methods
            .iter()
            .rev()
            .map(|m| StackFrame::new("app", *m))
            .collect()
    }

    #[test]
    fn test_log_attributes_time_along_path() {
        let mut root = ThreadNode::new("main");
        root.log(&stack(&["run", "handle", "parse"]), 10.0);

        assert!((root.time() - 10.0).abs() < f64::EPSILON);
        let run = root.children().find_method("app", "run").unwrap();
        let handle = run.children().find_method("app", "handle").unwrap();
        let parse = handle.children().find_method("app", "parse").unwrap();
        assert!((run.time() - 10.0).abs() < f64::EPSILON);
        assert!((handle.time() - 10.0).abs() < f64::EPSILON);
        assert!((parse.time() - 10.0).abs() < f64::EPSILON);
        assert!(parse.children().is_empty());
    }

    #[test]
    fn test_log_is_additive_on_shared_prefix() {
        let mut root = ThreadNode::new("main");
        root.log(&stack(&["run", "foo"]), 10.0);
        root.log(&stack(&["run", "bar"]), 5.0);

        let run = root.children().find_method("app", "run").unwrap();
        assert!((run.time() - 15.0).abs() < f64::EPSILON);
        assert_eq!(run.children().len(), 2);
        assert!((run.children().total_time() - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_ignores_empty_stack() {
        let mut root = ThreadNode::new("main");
        root.log(&[], 10.0);

        assert!(root.time().abs() < f64::EPSILON);
        assert!(root.children().is_empty());
    }

    #[test]
    fn test_log_truncates_deep_stacks_keeping_entry_point() {
        let methods: Vec<String> = (0..MAX_STACK_DEPTH + 20).map(|i| format!("m{i}")).collect();
        let frames: Vec<StackFrame> = methods
            .iter()
            .rev()
            .map(|m| StackFrame::new("deep", m.as_str()))
            .collect();

        let mut root = ThreadNode::new("main");
        root.log(&frames, 1.0);

        let mut depth = 0;
        let mut children = root.children();
        while let Some(node) = children.iter().next() {
            depth += 1;
            children = node.children();
        }
        assert_eq!(depth, MAX_STACK_DEPTH);
        let entry = FrameKey {
            class_name: "deep".into(),
            method_name: "m0".into(),
            line: None,
        };
        assert!(root.children().get(&entry).is_some());
    }
}
