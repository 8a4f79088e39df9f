use std::fmt::{self, Debug};

use super::{Mark, ModelError, Node};

#[derive(Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    offset: usize,
}

/// A position resolved against a document: the chain of ancestors it sits
/// in, with the child index and start offset at every depth.
#[derive(Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Node, pos: usize) -> Result<Self, ModelError> {
        if pos > doc.content_size() {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: doc.content_size(),
            });
        }

        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();

        loop {
            let (index, offset) = node.content().find_index(parent_offset, false)?;
            let remaining = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if remaining == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            parent_offset = remaining - 1;
            start += offset + 1;
            node = child;
        }

        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize { self.pos }

    /// Number of ancestors between the position and the document root.
    pub fn depth(&self) -> usize { self.path.len() - 1 }

    /// Offset into the parent node's content.
    pub fn parent_offset(&self) -> usize { self.parent_offset }

    /// The ancestor at `depth`; 0 is the document.
    pub fn node(&self, depth: usize) -> &Node { &self.path[depth].node }

    pub fn parent(&self) -> &Node { self.node(self.depth()) }

    pub fn doc(&self) -> &Node { self.node(0) }

    /// Index of the position in the ancestor at `depth`.
    pub fn index(&self, depth: usize) -> usize { self.path[depth].index }

    /// Index pointing after this position in the ancestor at `depth`.
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth() && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// Start of the content of the ancestor at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    /// End of the content of the ancestor at `depth`.
    pub fn end(&self, depth: usize) -> usize { self.start(depth) + self.node(depth).content_size() }

    /// Position before the ancestor at `depth`, which must be at least 1.
    pub fn before(&self, depth: usize) -> usize {
        if depth == self.depth() + 1 {
            self.pos
        } else {
            self.path[depth - 1].offset
        }
    }

    /// Position after the ancestor at `depth`, which must be at least 1.
    pub fn after(&self, depth: usize) -> usize {
        if depth == self.depth() + 1 {
            self.pos
        } else {
            self.path[depth - 1].offset + self.node(depth).node_size()
        }
    }

    /// Offset of the position into the text node it points into, or 0.
    pub fn text_offset(&self) -> usize {
        self.path
            .last()
            .map_or(0, |entry| self.pos - entry.offset)
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.maybe_child(index)?;
        let offset = self.text_offset();
        Some(if offset > 0 {
            child.cut(offset, child.node_size())
        } else {
            child.clone()
        })
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return self
                .parent()
                .maybe_child(index)
                .map(|child| child.cut(0, offset));
        }
        index
            .checked_sub(1)
            .and_then(|before| self.parent().maybe_child(before))
            .cloned()
    }

    /// The deepest depth whose node contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|depth| self.start(*depth) <= pos && self.end(*depth) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.depth() == other.depth() && self.start(self.depth()) == other.start(other.depth())
    }

    /// The marks that text inserted at this position would get. Non-inclusive
    /// marks only continue when present on both sides.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());

        if parent.content_size() == 0 {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }

        let before = index.checked_sub(1).and_then(|before| parent.maybe_child(before));
        let after = parent.maybe_child(index);
        let (main, other) = match (before, after) {
            (Some(main), other) => (main, other),
            (None, Some(main)) => (main, None),
            (None, None) => return Vec::new(),
        };

        main.marks()
            .iter()
            .filter(|mark| {
                mark.mark_type().is_inclusive()
                    || other.is_some_and(|other| mark.is_in_set(other.marks()))
            })
            .cloned()
            .collect()
    }
}

impl Debug for ResolvedPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self
            .path
            .windows(2)
            .map(|pair| format!("{}_{}", pair[1].node.node_type().name(), pair[0].index))
            .collect();
        write!(f, "{}:{}", path.join("/"), self.parent_offset)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::model::test_helpers::{doc, marked, node, p, schema, text};

    #[test_case(0, 0, 0, 0)]
    #[test_case(1, 1, 0, 1)]
    #[test_case(3, 1, 2, 1)]
    #[test_case(7, 0, 7, 0)]
    #[test_case(9, 2, 0, 9)]
    fn test_resolve(pos: usize, depth: usize, parent_offset: usize, start: usize) {
        let document = doc(vec![p("hello"), node("blockquote", vec![p("x")])]);
        let resolved = document.resolve(pos).unwrap();

        assert_eq!(resolved.depth(), depth);
        assert_eq!(resolved.parent_offset(), parent_offset);
        assert_eq!(resolved.start(depth), start);
    }

    #[test]
    fn test_positions_around_nodes() {
        let document = doc(vec![p("hello"), node("blockquote", vec![p("x")])]);
        let resolved = document.resolve(9).unwrap();

        assert_eq!(resolved.before(1), 7);
        assert_eq!(resolved.after(1), 12);
        assert_eq!(resolved.before(2), 8);
        assert_eq!(resolved.after(2), 11);
        assert_eq!(resolved.end(2), 10);
        assert_eq!(resolved.shared_depth(10), 2);
        assert_eq!(resolved.shared_depth(3), 0);
        assert_eq!(resolved.node_after(), Some(text("x")));
        assert_eq!(resolved.node_before(), None);
        assert!(document.resolve(20).is_err());
    }

    #[test]
    fn test_text_offset() {
        let document = doc(vec![p("hello")]);
        let resolved = document.resolve(3).unwrap();

        assert_eq!(resolved.text_offset(), 2);
        assert_eq!(resolved.index(1), 0);
        assert_eq!(resolved.index_after(1), 1);
        assert_eq!(resolved.node_before(), Some(text("he")));
        assert_eq!(resolved.node_after(), Some(text("llo")));
    }

    #[test]
    fn test_marks() {
        let link = schema()
            .mark(
                "link",
                &serde_json::json!({ "href": "x" }).as_object().cloned().unwrap(),
            )
            .unwrap();
        let linked = schema().text("link", vec![link]).unwrap();
        let document = doc(vec![node(
            "paragraph",
            vec![marked("ab", &["em"]), text("cd"), linked],
        )]);

        assert_eq!(format!("{:?}", document.resolve(2).unwrap().marks()), "[em]");
        assert_eq!(format!("{:?}", document.resolve(3).unwrap().marks()), "[em]");
        assert_eq!(document.resolve(5).unwrap().marks(), vec![]);
        assert_eq!(document.resolve(9).unwrap().marks(), vec![]);
        assert_eq!(document.resolve(7).unwrap().marks().len(), 1);
        assert_eq!(format!("{:?}", document.resolve(7).unwrap()), "paragraph_0:6");
    }
}
