use std::{
    fmt::{self, Debug},
    rc::Rc,
};

use super::{
    Attrs, ElementJson, Fragment, Mark, MarkType, ModelError, NodeJson, NodeType, ResolvedPos,
    Schema, Slice, TextJson, char_slice, replace::replace,
};

struct NodeInner {
    node_type: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
    size: usize,
}

/// An immutable document node. Cloning is cheap and shares the subtree.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl Node {
    pub(crate) fn new_element(
        node_type: NodeType,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Self {
        let size = if node_type.is_leaf() {
            1
        } else {
            content.size() + 2
        };
        Self(Rc::new(NodeInner {
            node_type,
            attrs,
            content,
            marks,
            text: None,
            size,
        }))
    }

    pub(crate) fn new_text(node_type: NodeType, text: String, marks: Vec<Mark>) -> Self {
        Self(Rc::new(NodeInner {
            node_type,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            size: text.chars().count(),
            text: Some(text),
        }))
    }

    pub fn node_type(&self) -> &NodeType { &self.0.node_type }

    pub fn schema(&self) -> &Schema { self.0.node_type.schema() }

    pub fn attrs(&self) -> &Attrs { &self.0.attrs }

    pub fn content(&self) -> &Fragment { &self.0.content }

    pub fn marks(&self) -> &[Mark] { &self.0.marks }

    /// The text of a text node.
    pub fn text(&self) -> Option<&str> { self.0.text.as_deref() }

    /// Size of the node in the flat position space, including the opening and
    /// closing tokens of non-leaf nodes.
    pub fn node_size(&self) -> usize { self.0.size }

    pub fn content_size(&self) -> usize { self.0.content.size() }

    pub fn child_count(&self) -> usize { self.0.content.child_count() }

    /// # Panics
    ///
    /// When `index` is out of range.
    pub fn child(&self, index: usize) -> &Node { self.0.content.child(index) }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> { self.0.content.maybe_child(index) }

    pub fn first_child(&self) -> Option<&Node> { self.0.content.first_child() }

    pub fn last_child(&self) -> Option<&Node> { self.0.content.last_child() }

    pub fn is_text(&self) -> bool { self.0.text.is_some() }

    pub fn is_leaf(&self) -> bool { self.0.node_type.is_leaf() }

    pub fn is_inline(&self) -> bool { self.0.node_type.is_inline() }

    pub fn is_block(&self) -> bool { self.0.node_type.is_block() }

    pub fn is_textblock(&self) -> bool { self.0.node_type.is_textblock() }

    pub fn inline_content(&self) -> bool { self.0.node_type.inline_content() }

    /// The concatenated text of all text nodes in the subtree.
    pub fn text_content(&self) -> String {
        match &self.0.text {
            Some(text) => text.clone(),
            None => self.0.content.text_between(0, self.content_size()),
        }
    }

    pub fn has_markup(&self, node_type: &NodeType, attrs: &Attrs, marks: &[Mark]) -> bool {
        self.0.node_type == *node_type && self.0.attrs == *attrs && Mark::same_set(&self.0.marks, marks)
    }

    /// Same type, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(&other.0.node_type, &other.0.attrs, &other.0.marks)
    }

    /// A node with the same markup holding `content`.
    #[must_use]
    pub fn copy(&self, content: Fragment) -> Node {
        if content == self.0.content {
            return self.clone();
        }
        Self::new_element(
            self.0.node_type.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    /// The node with its marks replaced by `marks`.
    #[must_use]
    pub fn mark(&self, marks: Vec<Mark>) -> Node {
        if Mark::same_set(&marks, &self.0.marks) {
            return self.clone();
        }
        Self(Rc::new(NodeInner {
            node_type: self.0.node_type.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            marks,
            text: self.0.text.clone(),
            size: self.0.size,
        }))
    }

    /// A text node with the same marks holding `text`.
    #[must_use]
    pub fn with_text(&self, text: String) -> Node {
        if self.0.text.as_ref() == Some(&text) {
            return self.clone();
        }
        Self::new_text(self.0.node_type.clone(), text, self.0.marks.clone())
    }

    /// The node with its content cut to `from..to`. For text nodes these are
    /// character offsets.
    #[must_use]
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.0.text {
            Some(text) => {
                if from == 0 && to == self.0.size {
                    return self.clone();
                }
                self.with_text(char_slice(text, from, to))
            }
            None => {
                if from == 0 && to == self.content_size() {
                    return self.clone();
                }
                self.copy(self.0.content.cut(from, to))
            }
        }
    }

    /// Cuts the content between the two positions out as a slice, open as
    /// deep as the positions share ancestors.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from == to {
            return Ok(Slice::empty());
        }

        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        let depth = from.shared_depth(to.pos());
        let start = from.start(depth);
        let content = from
            .node(depth)
            .content()
            .cut(from.pos() - start, to.pos() - start);

        Ok(Slice::new(content, from.depth() - depth, to.depth() - depth))
    }

    /// Replaces `from..to` with `slice`, failing when the result would not
    /// fit the schema.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        replace(&self.resolve(from)?, &self.resolve(to)?, slice)
    }

    /// The node directly after `pos`.
    pub fn node_at(&self, pos: usize) -> Option<Node> {
        let mut node = self.clone();
        let mut pos = pos;
        loop {
            let (index, offset) = node.content().find_index(pos, false).ok()?;
            let child = node.maybe_child(index)?.clone();
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    /// See [`Fragment::nodes_between`].
    pub fn nodes_between<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.0.content.nodes_between(from, to, 0, Some(self), &mut f);
    }

    /// Visits every descendant.
    pub fn descendants<F>(&self, f: F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.content_size(), f);
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> { ResolvedPos::resolve(self, pos) }

    /// Whether any inline node in `from..to` carries a mark of `mark_type`.
    pub fn range_has_mark(&self, from: usize, to: usize, mark_type: &MarkType) -> bool {
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, |node, _, _, _| {
                if mark_type.is_in_set(node.marks()).is_some() {
                    found = true;
                }
                !found
            });
        }
        found
    }

    /// Validates the subtree against the schema.
    pub fn check(&self) -> Result<(), ModelError> {
        if !self.is_text() {
            self.0.node_type.check_content(&self.0.content)?;
        }
        if !Mark::is_valid_set(&self.0.marks) {
            return Err(ModelError::InvalidMarks(self.0.node_type.name().to_owned()));
        }
        self.0.content.iter().try_for_each(Node::check)
    }

    pub fn to_json(&self) -> NodeJson {
        let marks = self.0.marks.iter().map(Mark::to_json).collect();
        match &self.0.text {
            Some(text) => NodeJson::Text(TextJson {
                node_type: self.0.node_type.name().to_owned(),
                marks,
                text: text.clone(),
            }),
            None => NodeJson::Element(ElementJson {
                node_type: self.0.node_type.name().to_owned(),
                attrs: self.0.attrs.clone(),
                content: self.0.content.to_json(),
                marks,
            }),
        }
    }

    /// Builds a node from its JSON form. Types, attributes and marks are
    /// resolved against `schema`; content is not validated, see
    /// [`Node::check`].
    pub fn from_json(schema: &Schema, json: &NodeJson) -> Result<Node, ModelError> {
        let marks = json
            .marks()
            .iter()
            .map(|mark| schema.mark(&mark.mark_type, &mark.attrs))
            .collect::<Result<Vec<_>, _>>()?;

        match json {
            NodeJson::Text(text) => {
                if text.node_type != Schema::TEXT_NODE {
                    return Err(ModelError::InvalidJson(format!(
                        "node of type `{}` has a text field",
                        text.node_type
                    )));
                }
                schema.text(&text.text, marks)
            }
            NodeJson::Element(element) => {
                let content = element
                    .content
                    .iter()
                    .map(|child| Node::from_json(schema, child))
                    .collect::<Result<Vec<_>, _>>()?;
                schema
                    .node_type(&element.node_type)?
                    .create(&element.attrs, Fragment::from_vec(content), marks)
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match &self.0.text {
            Some(text) => format!("{text:?}"),
            None if self.content_size() > 0 => {
                let children: Vec<String> = self
                    .0
                    .content
                    .iter()
                    .map(|child| format!("{child:?}"))
                    .collect();
                format!("{}({})", self.0.node_type.name(), children.join(", "))
            }
            None => self.0.node_type.name().to_owned(),
        };

        let wrapped = self
            .0
            .marks
            .iter()
            .rev()
            .fold(inner, |inner, mark| format!("{}({inner})", mark.mark_type().name()));
        write!(f, "{wrapped}")
    }
}
