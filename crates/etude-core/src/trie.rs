//! Segment trie for dynamic routes.
//!
//! Each node is one path segment. A node has any number of literal children
//! and at most one parameter child; lookups prefer the literal child and
//! never backtrack.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::handler::Handler;
use crate::route::is_param_segment;

/// Path parameters captured during a lookup, keyed by declared name.
pub type Params = HashMap<String, String>;

#[derive(Default)]
pub struct Node {
    segment: String,
    children: HashMap<String, Node>,
    param: Option<Box<Node>>,
    param_name: Option<String>,
    handler: Option<Handler>,
}

impl Node {
    pub fn root() -> Self {
        Node::default()
    }

    fn new(segment: &str) -> Self {
        Node {
            segment: segment.to_string(),
            ..Node::default()
        }
    }

    /// Whether a route ends at this node.
    pub fn is_terminus(&self) -> bool {
        self.handler.is_some()
    }

    /// Insert a normalized pattern. Intermediate nodes are created on demand.
    /// Returns `true` when an existing handler at the terminus was replaced.
    pub fn insert(&mut self, pattern: &str, handler: Handler) -> bool {
        let mut node = self;
        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            node = if is_param_segment(segment) {
                let name = &segment[1..];
                let child = node.param.get_or_insert_with(|| {
                    let mut child = Node::new(segment);
                    child.param_name = Some(name.to_string());
                    Box::new(child)
                });
                if child.param_name.as_deref() != Some(name) {
                    // Single parameter slot per depth: last registration names it.
                    tracing::warn!(
                        previous = child.param_name.as_deref().unwrap_or_default(),
                        renamed_to = name,
                        pattern,
                        "parameter renamed at shared trie position"
                    );
                    child.param_name = Some(name.to_string());
                    child.segment = segment.to_string();
                }
                &mut **child
            } else {
                node.children
                    .entry(segment.to_string())
                    .or_insert_with(|| Node::new(segment))
            };
        }
        node.handler.replace(handler).is_some()
    }

    /// Walk the trie along `path`. Literal segments are compared case-folded
    /// when `case_sensitive` is off; parameter values keep the request's case.
    pub fn find(&self, path: &str, case_sensitive: bool) -> Option<(Handler, Params)> {
        let mut node = self;
        let mut params = Params::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let key = if case_sensitive {
                Cow::Borrowed(segment)
            } else {
                Cow::Owned(segment.to_lowercase())
            };

            if let Some(child) = node.children.get(key.as_ref()) {
                node = child;
            } else if let Some(child) = node.param.as_deref() {
                if let Some(name) = &child.param_name {
                    params.insert(name.clone(), segment.to_string());
                }
                node = child;
            } else {
                return None;
            }
        }

        node.handler.clone().map(|h| (h, params))
    }

    /// Patterns of every terminus below this node, rebuilt from segments.
    pub fn patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_patterns(String::new(), &mut out);
        out.sort();
        out
    }

    fn collect_patterns(&self, prefix: String, out: &mut Vec<String>) {
        if self.is_terminus() {
            out.push(if prefix.is_empty() { "/".to_string() } else { prefix.clone() });
        }
        for child in self.children.values() {
            child.collect_patterns(format!("{}/{}", prefix, child.segment), out);
        }
        if let Some(child) = &self.param {
            let name = child.param_name.as_deref().unwrap_or_default();
            child.collect_patterns(format!("{}/:{}", prefix, name), out);
        }
    }

    /// Number of termini below (and including) this node.
    pub fn terminus_count(&self) -> usize {
        let own = usize::from(self.is_terminus());
        let literal: usize = self.children.values().map(Node::terminus_count).sum();
        let param = self.param.as_deref().map_or(0, Node::terminus_count);
        own + literal + param
    }
}
