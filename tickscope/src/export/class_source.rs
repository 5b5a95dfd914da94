//! Attribution of sampled classes to the module that provides them

use std::collections::{BTreeMap, HashSet};

use crate::tree::ExportedThread;

/// Identifies where a class comes from (plugin, crate, jar, ...)
pub trait ClassSourceLookup: Send + Sync {
    fn identify(&self, class_name: &str) -> Option<String>;
}

/// Longest-prefix match over `class prefix → source` rules
#[derive(Debug, Clone, Default)]
pub struct PrefixLookup {
    rules: Vec<(String, String)>,
}

impl PrefixLookup {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, prefix: impl Into<String>, source: impl Into<String>) -> Self {
        self.rules.push((prefix.into(), source.into()));
        self
    }
}

impl ClassSourceLookup for PrefixLookup {
    fn identify(&self, class_name: &str) -> Option<String> {
        self.rules
            .iter()
            .filter(|(prefix, _)| class_name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, source)| source.clone())
    }
}

/// Walks exported trees and records each class's source once
pub struct ClassSourceVisitor<'a> {
    lookup: &'a dyn ClassSourceLookup,
    seen: HashSet<String>,
    mapping: BTreeMap<String, String>,
}

impl<'a> ClassSourceVisitor<'a> {
    pub fn new(lookup: &'a dyn ClassSourceLookup) -> Self {
        Self {
            lookup,
            seen: HashSet::new(),
            mapping: BTreeMap::new(),
        }
    }

    pub fn visit(&mut self, thread: &ExportedThread) {
        thread.visit(&mut |node| {
            if self.seen.insert(node.class_name.clone()) {
                if let Some(source) = self.lookup.identify(&node.class_name) {
                    self.mapping.insert(node.class_name.clone(), source);
                }
            }
        });
    }

    pub fn has_mappings(&self) -> bool {
        !self.mapping.is_empty()
    }

    pub fn into_mapping(self) -> BTreeMap<String, String> {
        self.mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MergeMode;
    use crate::tree::ThreadNode;
    use tickscope_common::StackFrame;

    #[test]
    fn test_prefix_lookup_prefers_longest() {
        let lookup = PrefixLookup::new()
            .with_rule("app", "core")
            .with_rule("app::net", "net-plugin");
        let socket = lookup.identify("app::net::Socket");
        assert_eq!(socket.as_deref(), Some("net-plugin"));
        assert_eq!(lookup.identify("app::db").as_deref(), Some("core"));
        assert_eq!(lookup.identify("std::io"), None);
    }

    #[test]
    fn test_visitor_collects_known_classes() {
        let mut root = ThreadNode::new("main");
        root.log(
            &[
                StackFrame::new("std::io", "read"),
                StackFrame::new("app::net::Socket", "poll"),
                StackFrame::new("app::Server", "run"),
            ],
            1.0,
        );
        let lookup = PrefixLookup::new().with_rule("app::net", "net-plugin");
        let mut visitor = ClassSourceVisitor::new(&lookup);
        visitor.visit(&root.export(MergeMode::SeparateByLine));

        assert!(visitor.has_mappings());
        let mapping = visitor.into_mapping();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["app::net::Socket"], "net-plugin");
    }
}
