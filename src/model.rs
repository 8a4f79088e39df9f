//! Immutable rich-text document trees.
//!
//! Documents are trees of typed [`Node`]s validated against a [`Schema`].
//! Positions are flat integer offsets: every non-leaf node contributes an
//! opening and a closing token around its content, text contributes one
//! token per character and leaf nodes contribute a single token.
//!
//! All values are reference counted and never mutated after construction,
//! so unchanged subtrees are shared between document versions.

mod content;
mod fragment;
mod json;
mod mark;
mod node;
mod replace;
mod resolved_pos;
mod schema;
mod slice;

use thiserror::Error;

pub use fragment::Fragment;
pub use json::{ElementJson, MarkJson, NodeJson, SliceJson, TextJson};
pub use mark::{Mark, MarkType};
pub use node::Node;
pub use resolved_pos::ResolvedPos;
pub use schema::{Attrs, MarkSpec, NodeSpec, NodeType, Schema, SchemaBuilder, basic_schema};
pub use slice::Slice;

/// Failures raised by the document model: malformed schemas, JSON that does
/// not describe a valid node and structural replacements that would produce
/// invalid content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("Unknown mark type `{0}`")]
    UnknownMarkType(String),

    #[error("No value supplied for attribute `{attr}` of `{type_name}`")]
    MissingAttribute { type_name: String, attr: String },

    #[error("Invalid content for node `{0}`")]
    InvalidContent(String),

    #[error("Invalid collection of marks for node `{0}`")]
    InvalidMarks(String),

    #[error("Empty text nodes are not allowed")]
    EmptyText,

    #[error("Position {pos} out of range (content size is {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("{0}")]
    Replace(String),

    #[error("Invalid node JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Returns the characters of `text` between the character offsets `from`
/// and `to`.
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

#[cfg(test)]
pub(crate) mod test_helpers {
    //! Terse document builders for tests, all based on [`basic_schema`].

    use serde_json::json;

    use super::*;

    thread_local! {
        static SCHEMA: Schema = basic_schema().expect("the basic schema is well formed");
    }

    pub fn schema() -> Schema { SCHEMA.with(Clone::clone) }

    pub fn text(value: &str) -> Node {
        schema()
            .text(value, vec![])
            .expect("test text must not be empty")
    }

    pub fn marked(value: &str, marks: &[&str]) -> Node {
        let schema = schema();
        let marks = marks
            .iter()
            .map(|name| schema.mark(name, &Attrs::new()).expect("known mark"))
            .collect();
        schema.text(value, marks).expect("test text must not be empty")
    }

    pub fn node(name: &str, content: Vec<Node>) -> Node {
        schema()
            .node(name, &Attrs::new(), Fragment::from_vec(content), vec![])
            .expect("valid test node")
    }

    pub fn doc(content: Vec<Node>) -> Node { node("doc", content) }

    pub fn p(value: &str) -> Node {
        if value.is_empty() {
            node("paragraph", vec![])
        } else {
            node("paragraph", vec![text(value)])
        }
    }

    pub fn h(level: u64, value: &str) -> Node {
        let attrs = json!({ "level": level })
            .as_object()
            .cloned()
            .unwrap_or_default();
        schema()
            .node("heading", &attrs, Fragment::from_node(text(value)), vec![])
            .expect("valid heading")
    }
}
