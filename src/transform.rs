//! Steps, position mapping and the [`Transform`] that accumulates them.

mod mapping;
mod step;
mod step_map;

pub use mapping::Mapping;
pub use step::{AddMarkStep, RemoveMarkStep, ReplaceAroundStep, ReplaceStep, Step, StepError, StepJson};
pub use step_map::{Assoc, MapResult, RecoverToken, StepMap};

use crate::model::{Attrs, Fragment, Mark, MarkType, Node, NodeType, Slice};

/// Anything that moves document positions: a single [`StepMap`] or a whole
/// [`Mapping`].
pub trait Mappable {
    fn map(&self, pos: usize, assoc: Assoc) -> usize;

    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult;
}

/// Which marks [`Transform::remove_mark`] strips.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkMatch {
    All,
    Type(MarkType),
    Mark(Mark),
}

/// An append-only list of steps applied to a starting document, with the
/// intermediate documents and the accumulated mapping.
#[derive(Debug, Clone)]
pub struct Transform {
    doc: Node,
    docs: Vec<Node>,
    steps: Vec<Step>,
    mapping: Mapping,
}

impl Transform {
    #[must_use]
    pub fn new(doc: Node) -> Self {
        Self {
            doc,
            docs: Vec::new(),
            steps: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// The document after every step.
    pub fn doc(&self) -> &Node { &self.doc }

    /// The starting document.
    pub fn before(&self) -> &Node { self.docs.first().unwrap_or(&self.doc) }

    /// The document before each step.
    pub fn docs(&self) -> &[Node] { &self.docs }

    pub fn steps(&self) -> &[Step] { &self.steps }

    pub fn mapping(&self) -> &Mapping { &self.mapping }

    pub fn doc_changed(&self) -> bool { !self.steps.is_empty() }

    /// Applies `step`, failing without recording anything when it does not
    /// apply to the current document.
    pub fn step(&mut self, step: Step) -> Result<&mut Self, StepError> {
        let doc = step.apply(&self.doc)?;
        self.add_step(step, doc);
        Ok(self)
    }

    /// Like [`Transform::step`], but reports failure as `false`.
    pub fn maybe_step(&mut self, step: Step) -> bool {
        match step.apply(&self.doc) {
            Ok(doc) => {
                self.add_step(step, doc);
                true
            }
            Err(_) => false,
        }
    }

    fn add_step(&mut self, step: Step, doc: Node) {
        let before = std::mem::replace(&mut self.doc, doc);
        self.docs.push(before);
        self.mapping.append_map(step.get_map(), None);
        self.steps.push(step);
    }

    /// Replaces `from..to` with `slice`. Replacing an empty range with an
    /// empty slice records nothing.
    pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self, StepError> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::Replace(ReplaceStep::new(from, to, slice, false)))
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: Fragment,
    ) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::new(content, 0, 0))
    }

    pub fn insert(&mut self, pos: usize, content: Fragment) -> Result<&mut Self, StepError> {
        self.replace_with(pos, pos, content)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::empty())
    }

    /// Adds `mark` to the inline content in `from..to`, first removing the
    /// marks it excludes.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self, StepError> {
        let mut removed: Vec<RemoveMarkStep> = Vec::new();
        let mut added: Vec<AddMarkStep> = Vec::new();

        self.doc.nodes_between(from, to, |node, pos, parent, _| {
            if !node.is_inline() {
                return true;
            }
            let marks = node.marks();
            let allowed = parent.is_some_and(|parent| parent.node_type().allows_mark_type(mark.mark_type()));
            if mark.is_in_set(marks) || !allowed {
                return true;
            }

            let start = pos.max(from);
            let end = (pos + node.node_size()).min(to);
            let new_set = mark.add_to_set(marks);

            for old in marks.iter().filter(|old| !old.is_in_set(&new_set)) {
                match removed.last_mut() {
                    Some(last) if last.to() == start && last.mark() == old => {
                        *last = RemoveMarkStep::new(last.from(), end, old.clone());
                    }
                    _ => removed.push(RemoveMarkStep::new(start, end, old.clone())),
                }
            }
            match added.last_mut() {
                Some(last) if last.to() == start => {
                    *last = AddMarkStep::new(last.from(), end, mark.clone());
                }
                _ => added.push(AddMarkStep::new(start, end, mark.clone())),
            }
            true
        });

        for step in removed {
            self.step(Step::RemoveMark(step))?;
        }
        for step in added {
            self.step(Step::AddMark(step))?;
        }
        Ok(self)
    }

    /// Removes the marks selected by `which` from the inline content in
    /// `from..to`.
    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        which: &MarkMatch,
    ) -> Result<&mut Self, StepError> {
        struct Matched {
            mark: Mark,
            from: usize,
            to: usize,
            step: usize,
        }

        let mut matched: Vec<Matched> = Vec::new();
        let mut step = 0;

        self.doc.nodes_between(from, to, |node, pos, _, _| {
            if !node.is_inline() {
                return true;
            }
            step += 1;

            let to_remove: Vec<Mark> = match which {
                MarkMatch::All => node.marks().to_vec(),
                MarkMatch::Type(mark_type) => node
                    .marks()
                    .iter()
                    .filter(|mark| mark.mark_type() == mark_type)
                    .cloned()
                    .collect(),
                MarkMatch::Mark(mark) if mark.is_in_set(node.marks()) => vec![mark.clone()],
                MarkMatch::Mark(_) => Vec::new(),
            };

            let end = (pos + node.node_size()).min(to);
            for mark in to_remove {
                if let Some(found) = matched
                    .iter_mut()
                    .find(|found| found.step + 1 == step && found.mark == mark)
                {
                    found.to = end;
                    found.step = step;
                } else {
                    matched.push(Matched {
                        mark,
                        from: pos.max(from),
                        to: end,
                        step,
                    });
                }
            }
            true
        });

        for found in matched {
            self.step(Step::RemoveMark(RemoveMarkStep::new(
                found.from, found.to, found.mark,
            )))?;
        }
        Ok(self)
    }

    /// Changes the type, attributes and marks of the node at `pos`, keeping
    /// its content. `None` keeps the current type.
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        node_type: Option<&NodeType>,
        attrs: &Attrs,
        marks: Option<Vec<Mark>>,
    ) -> Result<&mut Self, StepError> {
        let node = self
            .doc
            .node_at(pos)
            .ok_or_else(|| StepError(format!("No node at position {pos}")))?;
        let node_type = node_type.unwrap_or_else(|| node.node_type()).clone();
        let marks = marks.unwrap_or_else(|| node.marks().to_vec());
        let new_node = node_type.create(attrs, Fragment::empty(), marks)?;

        if node.is_leaf() {
            return self.replace_with(pos, pos + node.node_size(), Fragment::from_node(new_node));
        }
        if !node_type.valid_content(node.content()) {
            return Err(StepError(format!(
                "Invalid content for node type {}",
                node_type.name()
            )));
        }

        let size = node.node_size();
        self.step(Step::ReplaceAround(ReplaceAroundStep::new(
            pos,
            pos + size,
            pos + 1,
            pos + size - 1,
            Slice::new(Fragment::from_node(new_node), 0, 0),
            1,
            true,
        )))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::test_helpers::{doc, h, marked, node, p, schema, text};

    fn mark(name: &str) -> Mark { schema().mark(name, &Attrs::new()).unwrap() }

    #[test]
    fn test_records_docs_and_mapping() {
        let start = doc(vec![p("hello")]);
        let mut tr = Transform::new(start.clone());

        tr.insert(6, Fragment::from_node(text("!"))).unwrap();
        tr.delete(1, 2).unwrap();

        assert_eq!(tr.doc(), &doc(vec![p("ello!")]));
        assert_eq!(tr.before(), &start);
        assert_eq!(tr.docs().len(), 2);
        assert_eq!(tr.steps().len(), 2);
        assert!(tr.doc_changed());
        assert_eq!(tr.mapping().map(6, Assoc::After), 6);
    }

    #[test]
    fn test_failing_step_records_nothing() {
        let mut tr = Transform::new(doc(vec![p("one"), node("blockquote", vec![p("two")])]));

        assert!(tr.delete(4, 6).is_err());
        assert!(!tr.maybe_step(Step::Replace(ReplaceStep::new(4, 6, Slice::empty(), false))));
        assert!(!tr.doc_changed());
        assert!(tr.mapping().is_empty());
    }

    #[test]
    fn test_empty_replace_is_a_no_op() {
        let mut tr = Transform::new(doc(vec![p("abc")]));
        tr.replace(2, 2, Slice::empty()).unwrap();
        assert!(tr.steps().is_empty());
    }

    #[test]
    fn test_add_mark_merges_ranges() {
        let mut tr = Transform::new(doc(vec![node(
            "paragraph",
            vec![text("ab"), marked("cd", &["strong"]), text("ef")],
        )]));

        tr.add_mark(2, 6, &mark("em")).unwrap();

        assert_eq!(tr.steps().len(), 1);
        assert_eq!(tr.steps()[0].range(), (2, 6));
        assert_eq!(
            tr.doc(),
            &doc(vec![node(
                "paragraph",
                vec![
                    text("a"),
                    marked("b", &["em"]),
                    marked("cd", &["em", "strong"]),
                    marked("e", &["em"]),
                    text("f")
                ],
            )])
        );
    }

    #[test]
    fn test_add_mark_replaces_excluded_mark() {
        let schema = schema();
        let first = schema
            .mark("link", json!({ "href": "a" }).as_object().unwrap())
            .unwrap();
        let second = schema
            .mark("link", json!({ "href": "b" }).as_object().unwrap())
            .unwrap();
        let mut tr = Transform::new(doc(vec![p("link")]));

        tr.add_mark(1, 5, &first).unwrap();
        tr.add_mark(1, 5, &second).unwrap();

        assert_eq!(tr.steps().len(), 3);
        assert!(matches!(tr.steps()[1], Step::RemoveMark(_)));
        assert_eq!(tr.doc().child(0).child(0).marks(), &[second]);
    }

    #[test]
    fn test_remove_mark() {
        let start = doc(vec![node(
            "paragraph",
            vec![marked("ab", &["em", "strong"]), text("c"), marked("d", &["em"])],
        )]);

        let mut all = Transform::new(start.clone());
        all.remove_mark(0, start.content_size(), &MarkMatch::All).unwrap();
        assert_eq!(all.doc(), &doc(vec![p("abcd")]));

        let mut by_type = Transform::new(start.clone());
        let em = schema().mark_type("em").unwrap();
        by_type
            .remove_mark(0, start.content_size(), &MarkMatch::Type(em))
            .unwrap();
        assert_eq!(by_type.steps().len(), 2);
        assert_eq!(
            by_type.doc(),
            &doc(vec![node(
                "paragraph",
                vec![marked("ab", &["strong"]), text("cd")]
            )])
        );

        let mut by_mark = Transform::new(start);
        by_mark.remove_mark(1, 2, &MarkMatch::Mark(mark("strong"))).unwrap();
        assert_eq!(by_mark.steps()[0].range(), (1, 2));
    }

    #[test]
    fn test_set_node_markup() {
        let mut tr = Transform::new(doc(vec![p("title"), p("body")]));
        let heading = schema().node_type("heading").unwrap();

        tr.set_node_markup(0, Some(&heading), json!({ "level": 2 }).as_object().unwrap(), None)
            .unwrap();
        assert_eq!(tr.doc(), &doc(vec![h(2, "title"), p("body")]));
        assert!(matches!(tr.steps()[0], Step::ReplaceAround(_)));

        tr.set_node_markup(0, None, json!({ "level": 3 }).as_object().unwrap(), None)
            .unwrap();
        assert_eq!(tr.doc(), &doc(vec![h(3, "title"), p("body")]));

        assert!(tr.set_node_markup(100, None, &Attrs::new(), None).is_err());
    }
}
