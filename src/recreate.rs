//! Reconstructs a [`Transform`] between two documents without knowing the
//! edits that produced the second one.
//!
//! The documents' JSON forms are diffed into a typed patch first. The patch
//! is then replayed one operation at a time: operations are batched until the
//! patched JSON parses into a valid document again, and every batch becomes
//! one or more steps. Markup changes become `ReplaceAround` steps, text
//! replacements are narrowed down with a token diff and everything else
//! becomes a structural `Replace` step. Marks are reconciled in a final pass,
//! and adjacent replace steps are fused at the end.

use std::{collections::VecDeque, time::Duration};

use tracing::{debug, trace};

use crate::{
    diffs::raw_operation::RawOperation,
    errors::RecreateError,
    json_patch::{self, Field, PatchOp, PatchValue},
    model::{Fragment, Mark, ModelError, Node, NodeJson, Schema},
    tokenizer::{Tokenizer, character_tokenizer::character_tokenizer, word_tokenizer::word_tokenizer},
    transform::{Assoc, Mappable, MarkMatch, ReplaceStep, Step, Transform},
    utils::deadline::Deadline,
};

/// Tunes [`recreate_transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecreateOptions {
    /// Emit markup and mark steps instead of expressing every change as a
    /// replace step.
    pub complex_steps: bool,

    /// Diff changed text word by word instead of character by character.
    pub word_diffs: bool,

    /// Give up with [`RecreateError::TimedOut`] after this long.
    pub timeout: Option<Duration>,
}

impl Default for RecreateOptions {
    fn default() -> Self {
        Self {
            complex_steps: true,
            word_diffs: false,
            timeout: None,
        }
    }
}

/// Computes steps turning `from` into `to`. Both documents must belong to the
/// same schema.
///
/// ## Example
///
/// ```
/// use reconcile_doc::{Node, RecreateOptions, basic_schema, recreate_transform};
/// use serde_json::json;
///
/// let schema = basic_schema().unwrap();
/// let parse = |text: &str| {
///     let json = json!({
///         "type": "doc",
///         "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": text }] }]
///     });
///     Node::from_json(&schema, &serde_json::from_value(json).unwrap()).unwrap()
/// };
///
/// let from = parse("hello world");
/// let to = parse("hello there");
/// let tr = recreate_transform(&from, &to, &RecreateOptions::default()).unwrap();
///
/// assert_eq!(tr.doc(), &to);
/// ```
pub fn recreate_transform(
    from: &Node,
    to: &Node,
    options: &RecreateOptions,
) -> Result<Transform, RecreateError> {
    debug!(
        complex_steps = options.complex_steps,
        word_diffs = options.word_diffs,
        "Recreating transform"
    );

    let recreator = Recreator::new(from, to, options)?;
    let tr = recreator.run()?;

    debug!(steps = tr.steps().len(), "Recreated transform");
    Ok(tr)
}

struct Recreator<'a> {
    to: &'a Node,
    options: &'a RecreateOptions,
    schema: Schema,
    deadline: Deadline,
    tr: Transform,
    current: NodeJson,
    target: NodeJson,
    operations: VecDeque<PatchOp>,
}

impl<'a> Recreator<'a> {
    fn new(from: &'a Node, to: &'a Node, options: &'a RecreateOptions) -> Result<Self, RecreateError> {
        let schema = from.schema().clone();
        let deadline = Deadline::after(options.timeout);

        // Marks never move positions, so they are left out of the structural
        // diff and reconciled separately.
        let (current, target) = if options.complex_steps {
            (markless(&schema, from)?, markless(&schema, to)?)
        } else {
            (from.to_json(), to.to_json())
        };
        let operations = json_patch::diff(&current, &target, &deadline)?.into();

        Ok(Self {
            to,
            options,
            schema,
            deadline,
            tr: Transform::new(from.clone()),
            current,
            target,
            operations,
        })
    }

    fn run(mut self) -> Result<Transform, RecreateError> {
        self.recreate_content_steps()?;
        if self.options.complex_steps {
            self.recreate_mark_steps()?;
        }
        simplify(&self.tr)
    }

    fn parse(&self, json: &NodeJson) -> Result<Node, ModelError> { Node::from_json(&self.schema, json) }

    fn recreate_content_steps(&mut self) -> Result<(), RecreateError> {
        while let Some(first) = self.operations.pop_front() {
            let mut batch = vec![first.clone()];
            let mut after = self.current.clone();
            let mut operation = first;

            let to_doc = loop {
                self.deadline.check()?;

                if let Ok(patched) = json_patch::apply_operation(&after, &operation) {
                    after = patched;
                }
                if let Ok(doc) = self.parse(&after)
                    && doc.check().is_ok()
                {
                    break doc;
                }

                operation = self.operations.pop_front().ok_or(RecreateError::NoValidDiff)?;
                batch.push(operation.clone());
            };

            trace!(
                operations = batch.len(),
                path = %batch[0].path(),
                "Patch batch produces a valid document"
            );

            match batch.as_slice() {
                [single] if self.options.complex_steps && single.path().is_markup() => {
                    self.add_set_node_markup(&to_doc, after)?;
                }
                [
                    PatchOp::Replace {
                        path,
                        value: PatchValue::Text(text),
                    },
                ] if *path.field() == Field::Text => {
                    self.add_replace_text_steps(path, text)?;
                    self.current = after;
                }
                _ => self.add_replace_step(&to_doc, after)?,
            }
        }
        Ok(())
    }

    fn add_replace_step(&mut self, to_doc: &Node, after: NodeJson) -> Result<(), RecreateError> {
        let from_doc = self.parse(&self.current)?;

        // The batch may only touch JSON the schema normalizes away.
        if let Some(step) = replace_step_between(&from_doc, to_doc)? {
            trace!(range = ?step.range(), "Adding replace step");
            if !self.tr.maybe_step(step) {
                return Err(RecreateError::NoValidStep);
            }
        }
        self.current = after;
        Ok(())
    }

    fn add_set_node_markup(&mut self, to_doc: &Node, after: NodeJson) -> Result<(), RecreateError> {
        let from_doc = self.parse(&self.current)?;

        // Only a node whose content stayed the same can keep it.
        let changed = to_doc
            .content()
            .find_diff_start(from_doc.content(), 0)
            .and_then(|start| Some((start, from_doc.node_at(start)?, to_doc.node_at(start)?)))
            .filter(|(_, from_node, to_node)| from_node.content() == to_node.content());
        let Some((start, from_node, to_node)) = changed else {
            return self.add_replace_step(to_doc, after);
        };

        let node_type = (from_node.node_type() != to_node.node_type()).then(|| to_node.node_type());
        trace!(pos = start, node = to_node.node_type().name(), "Setting node markup");
        if self
            .tr
            .set_node_markup(start, node_type, to_node.attrs(), Some(to_node.marks().to_vec()))
            .is_err()
        {
            return self.add_replace_step(to_doc, after);
        }

        // The new markup can make later operations of the old patch invalid.
        self.current = markless(&self.schema, self.tr.doc())?;
        self.operations = json_patch::diff(&self.current, &self.target, &self.deadline)?.into();
        Ok(())
    }

    fn add_replace_text_steps(
        &mut self,
        path: &json_patch::Pointer,
        final_text: &str,
    ) -> Result<(), RecreateError> {
        // Two different sample texts locate the first position of the text.
        let sample = |value: &str| -> Result<Node, RecreateError> {
            let operation = PatchOp::Replace {
                path: path.clone(),
                value: PatchValue::Text(value.to_owned()),
            };
            let json = json_patch::apply_operation(&self.current, &operation)
                .map_err(|_| RecreateError::NoValidStep)?;
            Ok(self.parse(&json)?)
        };
        let first_sample = sample("xx")?;
        let second_sample = sample("yy")?;

        let mut offset = first_sample
            .content()
            .find_diff_start(second_sample.content(), 0)
            .ok_or(RecreateError::NoValidStep)?;
        let marks = first_sample.resolve(offset + 1)?.marks();

        let current_text = match json_patch::get(&self.current, path) {
            Some(NodeJson::Text(text)) => text.text.clone(),
            _ => return Err(RecreateError::NoValidStep),
        };

        let tokenizer: &Tokenizer<String> = if self.options.word_diffs {
            &word_tokenizer
        } else {
            &character_tokenizer
        };
        let mut runs: VecDeque<RawOperation<String>> =
            RawOperation::vec_from(&tokenizer(&current_text), &tokenizer(final_text), &self.deadline)?
                .into();

        while let Some(run) = runs.pop_front() {
            match run {
                RawOperation::Insert(_) => {
                    let inserted = self.text_node(&run.original_text(), &marks)?;
                    if let Some(RawOperation::Delete(_)) = runs.front()
                        && let Some(removed) = runs.pop_front()
                    {
                        self.tr.replace_with(
                            offset,
                            offset + removed.original_text_length(),
                            Fragment::from_node(inserted),
                        )?;
                    } else {
                        self.tr.insert(offset, Fragment::from_node(inserted))?;
                    }
                    offset += run.original_text_length();
                }
                RawOperation::Delete(_) => {
                    let length = run.original_text_length();
                    if let Some(RawOperation::Insert(_)) = runs.front()
                        && let Some(added) = runs.pop_front()
                    {
                        let inserted = self.text_node(&added.original_text(), &marks)?;
                        self.tr
                            .replace_with(offset, offset + length, Fragment::from_node(inserted))?;
                        offset += added.original_text_length();
                    } else {
                        self.tr.delete(offset, offset + length)?;
                    }
                }
                RawOperation::Equal(_) => offset += run.original_text_length(),
            }
        }
        Ok(())
    }

    fn text_node(&self, text: &str, marks: &[Mark]) -> Result<Node, ModelError> { self.schema.text(text, marks.to_vec()) }

    /// Once the content matches, walks the target's inline nodes and makes
    /// the marks at the same positions match.
    fn recreate_mark_steps(&mut self) -> Result<(), RecreateError> {
        let mut inline_nodes = Vec::new();
        self.to.descendants(|node, pos, _, _| {
            if node.is_inline() {
                inline_nodes.push((node.clone(), pos));
            }
            true
        });

        for (node, pos) in inline_nodes {
            let end = pos + node.node_size();

            for mark_type in self.schema.mark_types() {
                let node_marks: Vec<&Mark> = node
                    .marks()
                    .iter()
                    .filter(|mark| mark.mark_type() == mark_type)
                    .collect();
                if node_marks.is_empty() {
                    self.tr
                        .remove_mark(pos, end, &MarkMatch::Type(mark_type.clone()))?;
                } else {
                    for mark in node_marks {
                        self.tr.add_mark(pos, end, mark)?;
                    }
                }
            }

            let Some(new_node) = self.tr.doc().node_at(pos) else {
                return Err(RecreateError::NoValidStep);
            };
            if new_node.marks().len() != node.marks().len() {
                for mark in new_node.marks() {
                    if !mark.is_in_set(node.marks()) {
                        self.tr.remove_mark(pos, end, &MarkMatch::Mark(mark.clone()))?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// The JSON form of `doc` without any marks, with the text nodes that lost
/// their distinguishing marks joined.
fn markless(schema: &Schema, doc: &Node) -> Result<NodeJson, ModelError> {
    Ok(Node::from_json(schema, &doc.to_json().without_marks())?.to_json())
}

/// A single replace step turning `from` into `to`, covering everything
/// between their common prefix and common suffix, or `None` when the two
/// documents are equal.
pub(crate) fn replace_step_between(from: &Node, to: &Node) -> Result<Option<Step>, ModelError> {
    let Some(mut start) = to.content().find_diff_start(from.content(), 0) else {
        return Ok(None);
    };
    let Some((mut end_a, mut end_b)) =
        to.content()
            .find_diff_end(from.content(), to.content_size(), from.content_size())
    else {
        return Ok(None);
    };

    // When the prefix and the suffix overlap, pick the boundary with the
    // lower depth.
    let min_end = end_a.min(end_b);
    if start > min_end {
        let overlap = start - min_end;
        if from.resolve(start - overlap)?.depth() < to.resolve(end_a + overlap)?.depth() {
            start -= overlap;
        } else {
            end_a += overlap;
            end_b += overlap;
        }
    }

    Ok(Some(Step::Replace(ReplaceStep::new(
        start,
        end_b,
        to.slice(start, end_a)?,
        false,
    ))))
}

/// Rebuilds `tr` from its first document, fusing every replace step with the
/// replace steps that directly continue where it ended.
fn simplify(tr: &Transform) -> Result<Transform, RecreateError> {
    let mut simplified = Transform::new(tr.before().clone());
    let mut steps: VecDeque<Step> = tr.steps().iter().cloned().collect();

    while let Some(step) = steps.pop_front() {
        let mut pending = Some(step);

        loop {
            let Some(step @ Step::Replace(replace)) = &pending else {
                break;
            };
            let Some(Step::Replace(next)) = steps.front() else {
                break;
            };
            if step.get_map().map(replace.to(), Assoc::After) != next.from() {
                break;
            }

            let Some(next) = steps.pop_front() else {
                break;
            };
            let combined = next.apply(&step.apply(simplified.doc())?)?;
            pending = replace_step_between(simplified.doc(), &combined)?;
        }

        if let Some(step) = pending {
            simplified.step(step)?;
        }
    }

    trace!(
        before = tr.steps().len(),
        after = simplified.steps().len(),
        "Simplified transform"
    );
    Ok(simplified)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{
        basic_schema,
        test_helpers::{doc, h, marked, node, p, schema, text},
    };

    fn recreate(from: &Node, to: &Node) -> Transform {
        recreate_transform(from, to, &RecreateOptions::default()).unwrap()
    }

    fn replay(from: &Node, tr: &Transform) -> Node {
        tr.steps()
            .iter()
            .try_fold(from.clone(), |doc, step| step.apply(&doc))
            .unwrap()
    }

    #[test]
    fn test_identical_documents() {
        let document = doc(vec![h(1, "Title"), p("body")]);
        assert!(recreate(&document, &document).steps().is_empty());
    }

    #[test]
    fn test_text_change_is_narrow() {
        let from = doc(vec![p("hello world")]);
        let to = doc(vec![p("hello there")]);

        let tr = recreate(&from, &to);

        assert_eq!(tr.doc(), &to);
        assert!(!tr.steps().is_empty());
        for step in tr.steps() {
            let (start, end) = step.range();
            assert!(start >= 7 && end <= 13, "{step:?} touches unchanged text");
        }
    }

    #[test]
    fn test_word_diffs() {
        let from = doc(vec![p("the quick fox")]);
        let to = doc(vec![p("the slow fox")]);
        let options = RecreateOptions {
            word_diffs: true,
            ..RecreateOptions::default()
        };

        let tr = recreate_transform(&from, &to, &options).unwrap();

        assert_eq!(tr.doc(), &to);
        assert_eq!(tr.steps().len(), 1);
        assert_eq!(tr.steps()[0].range(), (4, 10));
    }

    #[test]
    fn test_markup_change() {
        let from = doc(vec![p("Title"), p("body")]);
        let to = doc(vec![h(1, "Title"), p("body")]);

        let tr = recreate(&from, &to);
        assert_eq!(tr.doc(), &to);
        assert!(matches!(tr.steps(), [Step::ReplaceAround(_)]));

        let simple = recreate_transform(
            &from,
            &to,
            &RecreateOptions {
                complex_steps: false,
                ..RecreateOptions::default()
            },
        )
        .unwrap();
        assert_eq!(simple.doc(), &to);
        assert!(simple.steps().iter().all(|step| matches!(step, Step::Replace(_))));
    }

    #[test]
    fn test_mark_changes() {
        let from = doc(vec![node(
            "paragraph",
            vec![text("hello "), marked("big", &["strong"]), text(" world")],
        )]);
        let to = doc(vec![node(
            "paragraph",
            vec![marked("hello ", &["em"]), text("big world")],
        )]);

        let tr = recreate(&from, &to);

        assert_eq!(tr.doc(), &to);
        assert!(tr
            .steps()
            .iter()
            .all(|step| matches!(step, Step::AddMark(_) | Step::RemoveMark(_))));
    }

    #[test]
    fn test_structural_change_is_simplified() {
        let from = doc(vec![p("one"), p("two")]);
        let to = doc(vec![p("one"), node("blockquote", vec![p("two")]), p("three")]);

        let tr = recreate(&from, &to);

        assert_eq!(tr.doc(), &to);
        assert_eq!(tr.steps().len(), 1);
        assert_eq!(replay(&from, &tr), to);
    }

    #[test]
    fn test_images_and_attributes() {
        let schema = schema();
        let image = |src: &str| {
            schema
                .node("image", json!({ "src": src }).as_object().unwrap(), Fragment::empty(), vec![])
                .unwrap()
        };
        let from = doc(vec![node("paragraph", vec![text("a"), image("one.png"), text("b")])]);
        let to = doc(vec![node("paragraph", vec![text("a"), image("two.png"), text("b")])]);

        let tr = recreate(&from, &to);
        assert_eq!(tr.doc(), &to);
        assert_eq!(replay(&from, &tr), to);

        let empty = doc(vec![p("")]);
        let tr = recreate(&from, &empty);
        assert_eq!(tr.doc(), &empty);

        let tr = recreate(&empty, &from);
        assert_eq!(tr.doc(), &from);
    }

    #[test]
    fn test_markup_change_next_to_restructured_blocks() {
        let schema = schema();
        let parse = |json: serde_json::Value| Node::from_json(&schema, &serde_json::from_value(json).unwrap()).unwrap();
        let from = parse(json!({
            "type": "doc",
            "content": [
                { "type": "heading", "attrs": { "level": 2 }, "content": [
                    { "type": "image", "attrs": { "src": "a.png", "alt": "a" } }
                ] },
                { "type": "heading", "attrs": { "level": 2 } },
                { "type": "blockquote", "content": [
                    { "type": "paragraph", "content": [
                        { "type": "text", "text": "ab" },
                        { "type": "image", "attrs": { "src": "b.png", "alt": "b" } }
                    ] }
                ] }
            ]
        }));
        let to = parse(json!({
            "type": "doc",
            "content": [
                { "type": "blockquote", "content": [
                    { "type": "heading", "attrs": { "level": 1 } },
                    { "type": "heading", "attrs": { "level": 2 }, "content": [
                        { "type": "hard_break" },
                        { "type": "text", "text": " ef" }
                    ] }
                ] }
            ]
        }));

        for (from, to) in [(&from, &to), (&to, &from)] {
            let tr = recreate(from, to);
            assert_eq!(tr.doc(), to);
            assert_eq!(&replay(from, &tr), to);
        }
    }

    #[test]
    fn test_documents_of_separate_schema_instances() {
        let other = basic_schema().unwrap();
        let from = doc(vec![p("hello big world")]);
        let marked_doc = doc(vec![node(
            "paragraph",
            vec![text("hello "), marked("big", &["strong"]), text(" world")],
        )]);
        let to = Node::from_json(&other, &marked_doc.to_json()).unwrap();

        let tr = recreate(&from, &to);

        assert_eq!(tr.doc(), &to);
        assert!(matches!(tr.steps(), [Step::AddMark(_)]));
    }

    #[test]
    fn test_invalid_target_has_no_valid_diff() {
        let schema = schema();
        let from = doc(vec![p("one")]);
        let empty = schema
            .node_type("doc")
            .unwrap()
            .create(&serde_json::Map::new(), Fragment::empty(), vec![])
            .unwrap();

        assert!(empty.check().is_err());
        assert_eq!(
            recreate_transform(&from, &empty, &RecreateOptions::default()).unwrap_err(),
            RecreateError::NoValidDiff
        );
    }

    #[test]
    fn test_timeout() {
        let from = doc(vec![p("one")]);
        let to = doc(vec![p("two")]);
        let options = RecreateOptions {
            timeout: Some(Duration::ZERO),
            ..RecreateOptions::default()
        };

        assert_eq!(
            recreate_transform(&from, &to, &options).unwrap_err(),
            RecreateError::TimedOut
        );
    }
}
