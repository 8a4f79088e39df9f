//! Wire form of documents: the plain nested-object representation nodes,
//! marks and slices serialize to.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::Attrs;

/// A node in its JSON form. Either a text leaf or an element with
/// attributes, children and marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeJson {
    Text(TextJson),
    Element(ElementJson),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextJson {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkJson>,

    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementJson {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Rc<NodeJson>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkJson {
    #[serde(rename = "type")]
    pub mark_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceJson {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Rc<NodeJson>>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub open_start: usize,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub open_end: usize,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &usize) -> bool { *value == 0 }

impl NodeJson {
    pub fn node_type(&self) -> &str {
        match self {
            NodeJson::Text(text) => &text.node_type,
            NodeJson::Element(element) => &element.node_type,
        }
    }

    pub fn marks(&self) -> &[MarkJson] {
        match self {
            NodeJson::Text(text) => &text.marks,
            NodeJson::Element(element) => &element.marks,
        }
    }

    /// Children of an element; text nodes have none.
    pub fn content(&self) -> &[Rc<NodeJson>] {
        match self {
            NodeJson::Text(_) => &[],
            NodeJson::Element(element) => &element.content,
        }
    }

    /// A copy of the tree with every mark removed.
    #[must_use]
    pub fn without_marks(&self) -> NodeJson {
        match self {
            NodeJson::Text(text) => NodeJson::Text(TextJson {
                node_type: text.node_type.clone(),
                marks: Vec::new(),
                text: text.text.clone(),
            }),
            NodeJson::Element(element) => NodeJson::Element(ElementJson {
                node_type: element.node_type.clone(),
                attrs: element.attrs.clone(),
                content: element
                    .content
                    .iter()
                    .map(|child| Rc::new(child.without_marks()))
                    .collect(),
                marks: Vec::new(),
            }),
        }
    }
}
