use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Debug},
    rc::Rc,
};

use serde_json::Value;

use super::{
    Fragment, Mark, MarkType, ModelError, Node, NodeJson, content::ContentExpr, mark::MarkTypeData,
};

/// Node and mark attributes keyed by attribute name.
pub type Attrs = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrSpec {
    name: String,
    default: Option<Value>,
}

/// Fills in defaults and drops unknown attributes. Attributes without a
/// default must be supplied.
pub(crate) fn compute_attrs(
    specs: &[AttrSpec],
    type_name: &str,
    given: &Attrs,
) -> Result<Attrs, ModelError> {
    specs
        .iter()
        .map(|spec| {
            given
                .get(&spec.name)
                .or(spec.default.as_ref())
                .map(|value| (spec.name.clone(), value.clone()))
                .ok_or_else(|| ModelError::MissingAttribute {
                    type_name: type_name.to_owned(),
                    attr: spec.name.clone(),
                })
        })
        .collect()
}

/// Which marks may appear on the children of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkRule {
    All,
    Only(BTreeSet<String>),
}

/// Declaration of a node type, see [`SchemaBuilder::node`].
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    content: String,
    groups: Vec<String>,
    inline: bool,
    marks: Option<String>,
    attrs: Vec<AttrSpec>,
}

impl NodeSpec {
    /// A node whose children must match the content expression `content`.
    /// Leaf nodes use an empty expression.
    #[must_use]
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            ..Self::default()
        }
    }

    /// The spec of the mandatory `text` node type.
    #[must_use]
    pub fn text() -> Self { Self::new("").group("inline").inline() }

    #[must_use]
    pub fn group(mut self, group: &str) -> Self {
        self.groups.push(group.to_owned());
        self
    }

    #[must_use]
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Marks allowed on the children: `"_"` for all, `""` for none or a
    /// space separated list of mark names. Defaults to all marks for nodes
    /// with inline content and none otherwise.
    #[must_use]
    pub fn marks(mut self, marks: &str) -> Self {
        self.marks = Some(marks.to_owned());
        self
    }

    /// A required attribute.
    #[must_use]
    pub fn attr(mut self, name: &str) -> Self {
        self.attrs.push(AttrSpec {
            name: name.to_owned(),
            default: None,
        });
        self
    }

    #[must_use]
    pub fn attr_default(mut self, name: &str, default: Value) -> Self {
        self.attrs.push(AttrSpec {
            name: name.to_owned(),
            default: Some(default),
        });
        self
    }
}

/// Declaration of a mark type, see [`SchemaBuilder::mark`].
#[derive(Debug, Clone)]
pub struct MarkSpec {
    attrs: Vec<AttrSpec>,
    inclusive: bool,
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self {
            attrs: Vec::new(),
            inclusive: true,
        }
    }
}

impl MarkSpec {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn attr(mut self, name: &str) -> Self {
        self.attrs.push(AttrSpec {
            name: name.to_owned(),
            default: None,
        });
        self
    }

    #[must_use]
    pub fn attr_default(mut self, name: &str, default: Value) -> Self {
        self.attrs.push(AttrSpec {
            name: name.to_owned(),
            default: Some(default),
        });
        self
    }

    /// Whether text typed at the end of the mark gets the mark too.
    #[must_use]
    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }
}

/// Collects node and mark declarations in order and validates them into a
/// [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<(String, NodeSpec)>,
    marks: Vec<(String, MarkSpec)>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn node(mut self, name: &str, spec: NodeSpec) -> Self {
        self.nodes.push((name.to_owned(), spec));
        self
    }

    #[must_use]
    pub fn mark(mut self, name: &str, spec: MarkSpec) -> Self {
        self.marks.push((name.to_owned(), spec));
        self
    }

    pub fn build(self) -> Result<Schema, ModelError> {
        let mut node_index = BTreeMap::new();
        for (index, (name, _)) in self.nodes.iter().enumerate() {
            if node_index.insert(name.clone(), index).is_some() {
                return Err(ModelError::InvalidSchema(format!(
                    "duplicate node type `{name}`"
                )));
            }
        }

        for required in [Schema::TOP_NODE, Schema::TEXT_NODE] {
            if !node_index.contains_key(required) {
                return Err(ModelError::InvalidSchema(format!(
                    "missing the `{required}` node type"
                )));
            }
        }

        let mut mark_index = BTreeMap::new();
        let mut marks = Vec::with_capacity(self.marks.len());
        for (rank, (name, spec)) in self.marks.into_iter().enumerate() {
            if mark_index.insert(name.clone(), rank).is_some() {
                return Err(ModelError::InvalidSchema(format!(
                    "duplicate mark type `{name}`"
                )));
            }
            marks.push(MarkType::from_data(MarkTypeData {
                name,
                rank,
                attrs: spec.attrs,
                inclusive: spec.inclusive,
            }));
        }

        let resolve = |name: &str| -> Option<Vec<String>> {
            if node_index.contains_key(name) {
                return Some(vec![name.to_owned()]);
            }
            let members: Vec<String> = self
                .nodes
                .iter()
                .filter(|(_, spec)| spec.groups.iter().any(|group| group == name))
                .map(|(member, _)| member.clone())
                .collect();
            (!members.is_empty()).then_some(members)
        };

        let inline_types: BTreeSet<&str> = self
            .nodes
            .iter()
            .filter(|(name, spec)| spec.inline || name == Schema::TEXT_NODE)
            .map(|(name, _)| name.as_str())
            .collect();

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (name, spec) in &self.nodes {
            let content = ContentExpr::parse(&spec.content, &resolve)?;
            let inline_content = content
                .names()
                .iter()
                .any(|child| inline_types.contains(child));

            let marks = match spec.marks.as_deref() {
                Some("_") => MarkRule::All,
                Some(list) => {
                    let names: BTreeSet<String> =
                        list.split_whitespace().map(str::to_owned).collect();
                    if let Some(unknown) = names.iter().find(|name| !mark_index.contains_key(*name))
                    {
                        return Err(ModelError::InvalidSchema(format!(
                            "unknown mark type `{unknown}` allowed in `{name}`"
                        )));
                    }
                    MarkRule::Only(names)
                }
                None if inline_content => MarkRule::All,
                None => MarkRule::Only(BTreeSet::new()),
            };

            nodes.push(Rc::new(NodeTypeData {
                name: name.clone(),
                groups: spec.groups.clone(),
                content,
                inline: spec.inline || name == Schema::TEXT_NODE,
                is_text: name == Schema::TEXT_NODE,
                inline_content,
                marks,
                attrs: spec.attrs.clone(),
            }));
        }

        Ok(Schema(Rc::new(SchemaInner {
            nodes,
            node_index,
            marks,
            mark_index,
        })))
    }
}

struct SchemaInner {
    nodes: Vec<Rc<NodeTypeData>>,
    node_index: BTreeMap<String, usize>,
    marks: Vec<MarkType>,
    mark_index: BTreeMap<String, usize>,
}

/// The set of node and mark types a document conforms to. Cheap to clone.
#[derive(Clone)]
pub struct Schema(Rc<SchemaInner>);

impl Schema {
    pub const TOP_NODE: &'static str = "doc";
    pub const TEXT_NODE: &'static str = "text";

    #[must_use]
    pub fn builder() -> SchemaBuilder { SchemaBuilder::default() }

    pub fn node_type(&self, name: &str) -> Result<NodeType, ModelError> {
        self.0
            .node_index
            .get(name)
            .map(|index| NodeType {
                data: Rc::clone(&self.0.nodes[*index]),
                schema: self.clone(),
            })
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_owned()))
    }

    pub fn mark_type(&self, name: &str) -> Result<MarkType, ModelError> {
        self.0
            .mark_index
            .get(name)
            .map(|index| self.0.marks[*index].clone())
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_owned()))
    }

    /// Mark types in rank order.
    pub fn mark_types(&self) -> &[MarkType] { &self.0.marks }

    pub fn top_node_type(&self) -> Result<NodeType, ModelError> { self.node_type(Self::TOP_NODE) }

    /// Creates a text node. Empty text is rejected.
    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Result<Node, ModelError> {
        if text.is_empty() {
            return Err(ModelError::EmptyText);
        }
        let node_type = self.node_type(Self::TEXT_NODE)?;
        Ok(Node::new_text(node_type, text.to_owned(), Mark::set_from(marks)))
    }

    /// Creates a node of the named type, checking its attributes and content.
    pub fn node(
        &self,
        name: &str,
        attrs: &Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        self.node_type(name)?.create_checked(attrs, content, marks)
    }

    pub fn mark(&self, name: &str, attrs: &Attrs) -> Result<Mark, ModelError> {
        self.mark_type(name)?.create(attrs)
    }

    /// Deserializes a node, see [`Node::from_json`].
    pub fn node_from_json(&self, json: &NodeJson) -> Result<Node, ModelError> {
        Node::from_json(self, json)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.0.node_index.keys().collect::<Vec<_>>())
            .field("marks", &self.0.mark_index.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct NodeTypeData {
    name: String,
    groups: Vec<String>,
    content: ContentExpr,
    inline: bool,
    is_text: bool,
    inline_content: bool,
    marks: MarkRule,
    attrs: Vec<AttrSpec>,
}

/// A node type of a [`Schema`].
#[derive(Clone)]
pub struct NodeType {
    data: Rc<NodeTypeData>,
    schema: Schema,
}

impl NodeType {
    pub fn name(&self) -> &str { &self.data.name }

    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn groups(&self) -> &[String] { &self.data.groups }

    pub fn is_text(&self) -> bool { self.data.is_text }

    pub fn is_inline(&self) -> bool { self.data.inline }

    pub fn is_block(&self) -> bool { !self.data.inline }

    /// Leaf nodes can not have content.
    pub fn is_leaf(&self) -> bool { self.data.content.is_empty() }

    pub fn inline_content(&self) -> bool { self.data.inline_content }

    /// A block whose content is inline, like a paragraph.
    pub fn is_textblock(&self) -> bool { self.is_block() && self.data.inline_content }

    /// Whether the given sequence of children is acceptable content for a
    /// node of this type, marks included.
    pub fn valid_content(&self, content: &Fragment) -> bool {
        let names: Vec<&str> = content
            .iter()
            .map(|child| child.node_type().data.name.as_str())
            .collect();

        self.data.content.matches(&names)
            && content
                .iter()
                .all(|child| self.allows_marks(child.marks()))
    }

    pub fn check_content(&self, content: &Fragment) -> Result<(), ModelError> {
        if self.valid_content(content) {
            Ok(())
        } else {
            Err(ModelError::InvalidContent(self.data.name.clone()))
        }
    }

    pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
        match &self.data.marks {
            MarkRule::All => true,
            MarkRule::Only(names) => names.contains(mark_type.name()),
        }
    }

    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks
            .iter()
            .all(|mark| self.allows_mark_type(mark.mark_type()))
    }

    /// Whether nodes of the two types accept the same content.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other || self.data.content == other.data.content
    }

    pub fn compute_attrs(&self, attrs: &Attrs) -> Result<Attrs, ModelError> {
        compute_attrs(&self.data.attrs, &self.data.name, attrs)
    }

    /// Creates a node without validating its content.
    pub fn create(
        &self,
        attrs: &Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        if self.is_text() {
            return Err(ModelError::InvalidContent(
                "text nodes are created through `Schema::text`".to_owned(),
            ));
        }
        Ok(Node::new_element(
            self.clone(),
            self.compute_attrs(attrs)?,
            content,
            Mark::set_from(marks),
        ))
    }

    /// Like [`NodeType::create`], but fails when the content does not match
    /// the type's content expression.
    pub fn create_checked(
        &self,
        attrs: &Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        self.check_content(&content)?;
        self.create(attrs, content, marks)
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.data, &other.data) || self.data.name == other.data.name }
}

impl Eq for NodeType {}

impl Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeType").field(&self.data.name).finish()
    }
}

/// A small rich-text schema: paragraphs, headings, blockquotes, images and
/// hard breaks, with `em`, `strong`, `code` and `link` marks.
pub fn basic_schema() -> Result<Schema, ModelError> {
    Schema::builder()
        .node(Schema::TOP_NODE, NodeSpec::new("block+"))
        .node("paragraph", NodeSpec::new("inline*").group("block"))
        .node("blockquote", NodeSpec::new("block+").group("block"))
        .node(
            "heading",
            NodeSpec::new("inline*")
                .group("block")
                .attr_default("level", Value::from(1)),
        )
        .node(Schema::TEXT_NODE, NodeSpec::text())
        .node(
            "image",
            NodeSpec::new("")
                .group("inline")
                .inline()
                .attr("src")
                .attr_default("alt", Value::Null),
        )
        .node("hard_break", NodeSpec::new("").group("inline").inline())
        .mark("em", MarkSpec::new())
        .mark("strong", MarkSpec::new())
        .mark("code", MarkSpec::new())
        .mark(
            "link",
            MarkSpec::new()
                .attr("href")
                .attr_default("title", Value::Null)
                .inclusive(false),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::test_helpers::{doc, h, p, schema, text};

    #[test]
    fn test_basic_schema_types() {
        let schema = schema();
        let paragraph = schema.node_type("paragraph").unwrap();

        assert!(paragraph.is_textblock());
        assert!(!paragraph.is_leaf());
        assert!(schema.node_type("image").unwrap().is_leaf());
        assert!(schema.node_type("text").unwrap().is_inline());
        assert!(!schema.top_node_type().unwrap().inline_content());
        assert_eq!(
            schema.node_type("nope"),
            Err(ModelError::UnknownNodeType("nope".to_owned()))
        );
        assert!(paragraph.compatible_content(&schema.node_type("heading").unwrap()));
        assert!(!paragraph.compatible_content(&schema.node_type("blockquote").unwrap()));
    }

    #[test]
    fn test_attrs_are_computed() {
        assert_eq!(h(2, "Title").attrs().get("level"), Some(&json!(2)));
        assert_eq!(
            schema()
                .node("heading", &Attrs::new(), Fragment::empty(), vec![])
                .unwrap()
                .attrs()
                .get("level"),
            Some(&json!(1))
        );
        assert_eq!(
            schema().node("image", &Attrs::new(), Fragment::empty(), vec![]),
            Err(ModelError::MissingAttribute {
                type_name: "image".to_owned(),
                attr: "src".to_owned(),
            })
        );
    }

    #[test]
    fn test_content_is_validated() {
        assert!(
            schema()
                .node("doc", &Attrs::new(), Fragment::from_node(text("loose")), vec![])
                .is_err()
        );
        assert!(
            schema()
                .node("doc", &Attrs::new(), Fragment::empty(), vec![])
                .is_err()
        );
        assert_eq!(doc(vec![p("a"), p("")]).child_count(), 2);
        assert_eq!(schema().text("", vec![]), Err(ModelError::EmptyText));
    }

    #[test]
    fn test_builder_errors() {
        assert!(
            Schema::builder()
                .node("doc", NodeSpec::new("paragraph+"))
                .node("text", NodeSpec::text())
                .build()
                .is_err()
        );
        assert!(
            Schema::builder()
                .node("doc", NodeSpec::new("text*"))
                .node("doc", NodeSpec::new("text*"))
                .node("text", NodeSpec::text())
                .build()
                .is_err()
        );
        assert!(
            Schema::builder()
                .node("doc", NodeSpec::new("text*"))
                .build()
                .is_err()
        );
        assert!(
            Schema::builder()
                .node("doc", NodeSpec::new("text*").marks("bold"))
                .node("text", NodeSpec::text())
                .build()
                .is_err()
        );
    }
}
