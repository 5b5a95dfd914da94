//! Export-time flattening of call trees
//!
//! The stored tree always separates frames by line. Exporting applies the
//! requested [`MergeMode`] and orders every level by descending time; the sort
//! is stable, so equal-time siblings keep their first-seen order.

use serde::Serialize;
use std::collections::HashMap;

use super::node::StackTraceNode;
use super::thread_node::ThreadNode;
use crate::domain::MergeMode;

/// An exported thread root
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedThread {
    pub name: String,
    pub time: f64,
    pub children: Vec<ExportedNode>,
}

/// An exported call frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedNode {
    pub class_name: String,
    pub method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub time: f64,
    /// Time not accounted for by any child
    pub self_time: f64,
    pub children: Vec<ExportedNode>,
}

impl ExportedNode {
    /// Depth-first walk over this node and all of its descendants
    pub fn visit(&self, visitor: &mut impl FnMut(&ExportedNode)) {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }
}

impl ExportedThread {
    /// Depth-first walk over every frame node of this thread
    pub fn visit(&self, visitor: &mut impl FnMut(&ExportedNode)) {
        for child in &self.children {
            child.visit(visitor);
        }
    }
}

impl ThreadNode {
    /// Export this root and its subtree under `mode`
    pub fn export(&self, mode: MergeMode) -> ExportedThread {
        let children: Vec<&StackTraceNode> = self.children().iter().collect();
        ExportedThread {
            name: self.name().to_string(),
            time: self.time(),
            children: export_children(&children, mode),
        }
    }
}

fn export_children(nodes: &[&StackTraceNode], mode: MergeMode) -> Vec<ExportedNode> {
    let mut exported = match mode {
        MergeMode::SeparateByLine => nodes
            .iter()
            .map(|node| {
                let children: Vec<&StackTraceNode> = node.children().iter().collect();
                exported_node(node, node.key().line, node.time(), &children, mode)
            })
            .collect(),
        MergeMode::CollapseByMethod => collapse_by_method(nodes, mode),
    };

    exported.sort_by(|a: &ExportedNode, b: &ExportedNode| {
        b.time.total_cmp(&a.time)
    });
    exported
}

/// Merge siblings sharing `(class, method)`; their children are pooled and
/// collapsed again one level down.
fn collapse_by_method(nodes: &[&StackTraceNode], mode: MergeMode) -> Vec<ExportedNode> {
    struct Group<'a> {
        first: &'a StackTraceNode,
        time: f64,
        children: Vec<&'a StackTraceNode>,
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();

    for &node in nodes {
        let frame = node.key();
        let key = (frame.class_name.as_str(), frame.method_name.as_str());
        let position = *positions.entry(key).or_insert_with(|| {
            groups.push(Group {
                first: node,
                time: 0.0,
                children: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[position];
        group.time += node.time();
        group.children.extend(node.children().iter());
    }

    groups
        .into_iter()
        .map(|group| {
            exported_node(group.first, None, group.time, &group.children, mode)
        })
        .collect()
}

fn exported_node(
    node: &StackTraceNode,
    line: Option<u32>,
    time: f64,
    children: &[&StackTraceNode],
    mode: MergeMode,
) -> ExportedNode {
    let children = export_children(children, mode);
    let child_time: f64 = children.iter().map(|c| c.time).sum();
    ExportedNode {
        class_name: node.key().class_name.clone(),
        method_name: node.key().method_name.clone(),
        line,
        time,
        self_time: (time - child_time).max(0.0),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickscope_common::StackFrame;

    fn frame(method: &str, line: u32) -> StackFrame {
        StackFrame::new("app", method).with_line(line)
    }

    /// `run:1 -> work:10 -> io` twice, `run:1 -> work:20 -> io` once,
    /// `run:1 -> idle` once
    fn sample_root() -> ThreadNode {
        let mut root = ThreadNode::new("main");
        let io = StackFrame::new("std", "read");
        root.log(&[io.clone(), frame("work", 10), frame("run", 1)], 10.0);
        root.log(&[io.clone(), frame("work", 10), frame("run", 1)], 10.0);
        root.log(&[io, frame("work", 20), frame("run", 1)], 10.0);
        root.log(&[frame("idle", 5), frame("run", 1)], 10.0);
        root
    }

    #[test]
    fn test_separate_by_line_keeps_call_sites() {
        let exported = sample_root().export(MergeMode::SeparateByLine);
        let run = &exported.children[0];
        assert_eq!(run.children.len(), 3);
        assert_eq!(run.children[0].line, Some(10));
        assert!((run.children[0].time - 20.0).abs() < f64::EPSILON);
        // equal times keep first-seen order
        assert_eq!(run.children[1].line, Some(20));
        assert_eq!(run.children[2].method_name, "idle");
    }

    #[test]
    fn test_collapse_by_method_sums_lines() {
        let exported = sample_root().export(MergeMode::CollapseByMethod);
        let run = &exported.children[0];
        assert_eq!(run.children.len(), 2);

        let work = &run.children[0];
        assert_eq!(work.method_name, "work");
        assert_eq!(work.line, None);
        assert!((work.time - 30.0).abs() < f64::EPSILON);
        // pooled grandchildren collapse too
        assert_eq!(work.children.len(), 1);
        assert!((work.children[0].time - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_self_time_excludes_children() {
        let mut root = ThreadNode::new("main");
        root.log(&[StackFrame::new("app", "run")], 10.0);
        root.log(
            &[
                StackFrame::new("app", "leaf"),
                StackFrame::new("app", "run"),
            ],
            10.0,
        );

        let exported = root.export(MergeMode::SeparateByLine);
        let run = &exported.children[0];
        assert!((run.time - 20.0).abs() < f64::EPSILON);
        assert!((run.self_time - 10.0).abs() < f64::EPSILON);
        assert!((run.children[0].self_time - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_visit_reaches_every_node() {
        let exported = sample_root().export(MergeMode::SeparateByLine);
        let mut count = 0;
        exported.visit(&mut |_| count += 1);
        // run, work:10, read, work:20, read, idle
        assert_eq!(count, 6);
    }
}
