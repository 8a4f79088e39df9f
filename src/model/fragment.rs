use std::{
    fmt::{self, Debug},
    rc::Rc,
    slice,
};

use super::{ModelError, Node, NodeJson};

/// An ordered, immutable sequence of sibling nodes with a cached size.
#[derive(Clone, Default)]
pub struct Fragment {
    content: Vec<Node>,
    size: usize,
}

impl Fragment {
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Builds a fragment, joining adjacent text nodes that carry the same
    /// marks.
    #[must_use]
    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut content: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_joined(&mut content, node);
        }
        let size = content.iter().map(Node::node_size).sum();
        Self { content, size }
    }

    #[must_use]
    pub fn from_node(node: Node) -> Self {
        Self {
            size: node.node_size(),
            content: vec![node],
        }
    }

    pub fn size(&self) -> usize { self.size }

    pub fn child_count(&self) -> usize { self.content.len() }

    /// # Panics
    ///
    /// When `index` is out of range.
    pub fn child(&self, index: usize) -> &Node { &self.content[index] }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> { self.content.get(index) }

    pub fn first_child(&self) -> Option<&Node> { self.content.first() }

    pub fn last_child(&self) -> Option<&Node> { self.content.last() }

    pub fn iter(&self) -> slice::Iter<'_, Node> { self.content.iter() }

    pub fn children(&self) -> &[Node] { &self.content }

    /// Calls `f` for every node overlapping `from..to`, with its absolute
    /// position (offset by `node_start`), its parent and its index in the
    /// parent. Children are visited unless `f` returns `false`.
    pub fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        node_start: usize,
        parent: Option<&Node>,
        f: &mut F,
    ) where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (index, child) in self.content.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, index) && child.content_size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    node_start + start,
                    Some(child),
                    f,
                );
            }
            pos = end;
        }
    }

    /// Concatenated text of the text nodes between `from` and `to`.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut text = String::new();
        self.nodes_between(from, to, 0, None, &mut |node, pos, _, _| {
            if let Some(value) = node.text() {
                let start = from.saturating_sub(pos);
                let end = to.saturating_sub(pos).min(node.node_size());
                text.push_str(&super::char_slice(value, start, end));
            }
            true
        });
        text
    }

    /// Joins two fragments, merging the touching text nodes when their marks
    /// match.
    #[must_use]
    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size == 0 {
            return self.clone();
        }
        if self.size == 0 {
            return other.clone();
        }

        let mut content = self.content.clone();
        let mut rest = other.content.iter();
        if let (Some(last), Some(first)) = (content.last_mut(), other.content.first()) {
            if let (Some(a), Some(b)) = (last.text(), first.text())
                && last.same_markup(first)
            {
                *last = last.with_text(format!("{a}{b}"));
                rest.next();
            }
        }
        content.extend(rest.cloned());

        Self {
            content,
            size: self.size + other.size,
        }
    }

    /// The part of the fragment between the two positions, cutting through
    /// partially covered children.
    #[must_use]
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to == self.size {
            return self.clone();
        }

        let mut content = Vec::new();
        let mut size = 0;
        if to > from {
            let mut pos = 0;
            for child in &self.content {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let child = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), child.node_size().min(to - pos))
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                child.content_size().min((to - pos).saturating_sub(1)),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    size += child.node_size();
                    content.push(child);
                }
                pos = end;
            }
        }

        Self { content, size }
    }

    #[must_use]
    pub fn cut_by_index(&self, from: usize, to: usize) -> Fragment {
        Self::from_vec(self.content[from..to].to_vec())
    }

    #[must_use]
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut content = self.content.clone();
        let size = self.size - content[index].node_size() + node.node_size();
        content[index] = node;
        Self { content, size }
    }

    /// Finds the child index at `pos` and the offset at which that child
    /// starts. With `round_up`, a position inside a child resolves to the
    /// next child.
    pub fn find_index(&self, pos: usize, round_up: bool) -> Result<(usize, usize), ModelError> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.content.len(), pos));
        }
        if pos > self.size {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: self.size,
            });
        }

        let mut offset = 0;
        for (index, child) in self.content.iter().enumerate() {
            let end = offset + child.node_size();
            if end >= pos {
                if end == pos || round_up {
                    return Ok((index + 1, end));
                }
                return Ok((index, offset));
            }
            offset = end;
        }

        Err(ModelError::PositionOutOfRange {
            pos,
            size: self.size,
        })
    }

    /// The first position at which this fragment and `other` differ, or
    /// `None` when they are the same. `pos` is the position of the
    /// fragments' start.
    pub fn find_diff_start(&self, other: &Fragment, pos: usize) -> Option<usize> {
        let mut pos = pos;
        for index in 0.. {
            let (Some(a), Some(b)) = (self.maybe_child(index), other.maybe_child(index)) else {
                return (self.child_count() != other.child_count()).then_some(pos);
            };

            if a == b {
                pos += a.node_size();
                continue;
            }
            if !a.same_markup(b) {
                return Some(pos);
            }
            if let (Some(text_a), Some(text_b)) = (a.text(), b.text()) {
                let same = text_a
                    .chars()
                    .zip(text_b.chars())
                    .take_while(|(x, y)| x == y)
                    .count();
                return Some(pos + same);
            }
            if a.content_size() > 0 || b.content_size() > 0 {
                if let Some(inner) = a.content().find_diff_start(b.content(), pos + 1) {
                    return Some(inner);
                }
            }
            pos += a.node_size();
        }

        None
    }

    /// The last positions, in this fragment and in `other`, at which they
    /// differ, or `None` when they are the same. `pos_a` and `pos_b` are the
    /// end positions of the fragments.
    pub fn find_diff_end(
        &self,
        other: &Fragment,
        pos_a: usize,
        pos_b: usize,
    ) -> Option<(usize, usize)> {
        let (mut pos_a, mut pos_b) = (pos_a, pos_b);
        let mut a_children = self.content.iter().rev();
        let mut b_children = other.content.iter().rev();

        loop {
            let (Some(a), Some(b)) = (a_children.next(), b_children.next()) else {
                return (self.child_count() != other.child_count()).then_some((pos_a, pos_b));
            };

            let size = a.node_size();
            if a == b {
                pos_a -= size;
                pos_b -= size;
                continue;
            }
            if !a.same_markup(b) {
                return Some((pos_a, pos_b));
            }
            if let (Some(text_a), Some(text_b)) = (a.text(), b.text()) {
                let same = text_a
                    .chars()
                    .rev()
                    .zip(text_b.chars().rev())
                    .take_while(|(x, y)| x == y)
                    .count();
                return Some((pos_a - same, pos_b - same));
            }
            if a.content_size() > 0 || b.content_size() > 0 {
                if let Some(inner) = a.content().find_diff_end(b.content(), pos_a - 1, pos_b - 1)
                {
                    return Some(inner);
                }
            }
            pos_a -= size;
            pos_b -= b.node_size();
        }
    }

    pub fn to_json(&self) -> Vec<Rc<NodeJson>> {
        self.content
            .iter()
            .map(|node| Rc::new(node.to_json()))
            .collect()
    }
}

/// Pushes `node`, merging it into the previous text node when the marks
/// match.
pub(crate) fn push_joined(content: &mut Vec<Node>, node: Node) {
    if let Some(last) = content.last_mut()
        && let (Some(a), Some(b)) = (last.text(), node.text())
        && last.same_markup(&node)
    {
        *last = last.with_text(format!("{a}{b}"));
        return;
    }
    content.push(node);
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool { self.size == other.size && self.content == other.content }
}

impl Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (index, child) in self.content.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child:?}")?;
        }
        write!(f, ">")
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}
