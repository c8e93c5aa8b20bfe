//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::path::PathBuf;

use uast_transformer::transform::{transformers, Mapping, ObjectToNode, RolesDedup, Transformer};
use uast_transformer::Node;

/// Builds a node from a JSON literal.
pub fn node(value: serde_json::Value) -> Node {
    serde_json::from_value(value).expect("valid node")
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_node(name: &str) -> Node {
    let text = std::fs::read_to_string(fixture(name)).expect("fixture exists");
    serde_json::from_str(&text).expect("fixture is a valid tree")
}

/// Head stage for native trees tagging their type under `ast_type`.
pub fn head() -> ObjectToNode {
    ObjectToNode {
        internal_type_key: Some("ast_type".to_string()),
        ..ObjectToNode::default()
    }
}

/// Head stage, `rules` as sequential stages, then role deduplication.
pub fn pipeline(rules: Vec<Mapping>) -> Vec<Box<dyn Transformer>> {
    let head: Box<dyn Transformer> = Box::new(head());
    let tail: Box<dyn Transformer> = Box::new(RolesDedup);
    let rules = rules
        .into_iter()
        .map(|m| Box::new(m) as Box<dyn Transformer>)
        .collect();
    transformers(vec![vec![head], rules, vec![tail]])
}
