use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Assoc, Mappable, StepMap};
use crate::model::{Fragment, Mark, MarkJson, ModelError, Node, Schema, Slice, SliceJson};

/// A step that could not be applied, with a description of why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StepError(pub String);

impl From<ModelError> for StepError {
    fn from(error: ModelError) -> Self { Self(error.to_string()) }
}

/// Replaces `from..to` with a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceStep {
    from: usize,
    to: usize,
    slice: Slice,
    structure: bool,
}

/// Replaces `from..to` with a slice while keeping the content between
/// `gap_from` and `gap_to`, which is reinserted into the slice at `insert`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceAroundStep {
    from: usize,
    to: usize,
    gap_from: usize,
    gap_to: usize,
    slice: Slice,
    insert: usize,
    structure: bool,
}

/// Adds a mark to the inline content in `from..to`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddMarkStep {
    from: usize,
    to: usize,
    mark: Mark,
}

/// Removes a mark from the inline content in `from..to`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveMarkStep {
    from: usize,
    to: usize,
    mark: Mark,
}

/// An atomic, invertible and mappable document change.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Replace(ReplaceStep),
    ReplaceAround(ReplaceAroundStep),
    AddMark(AddMarkStep),
    RemoveMark(RemoveMarkStep),
}

/// Serialized form of a [`Step`], discriminated by `stepType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepJson {
    Replace {
        from: usize,
        to: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slice: Option<SliceJson>,
        #[serde(default, skip_serializing_if = "is_false")]
        structure: bool,
    },
    ReplaceAround {
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slice: Option<SliceJson>,
        insert: usize,
        #[serde(default, skip_serializing_if = "is_false")]
        structure: bool,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: MarkJson,
    },
    RemoveMark {
        from: usize,
        to: usize,
        mark: MarkJson,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool { !*value }

impl ReplaceStep {
    #[must_use]
    pub fn new(from: usize, to: usize, slice: Slice, structure: bool) -> Self {
        Self {
            from,
            to,
            slice,
            structure,
        }
    }

    pub fn from(&self) -> usize { self.from }

    pub fn to(&self) -> usize { self.to }

    pub fn slice(&self) -> &Slice { &self.slice }

    /// Whether the step refuses to overwrite content.
    pub fn structure(&self) -> bool { self.structure }

    fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        if self.structure && content_between(doc, self.from, self.to)? {
            return Err(StepError(
                "Structure replace would overwrite content".to_owned(),
            ));
        }
        Ok(doc.replace(self.from, self.to, &self.slice)?)
    }

    fn get_map(&self) -> StepMap { StepMap::new(&[(self.from, self.to - self.from, self.slice.size())]) }

    fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        Ok(Step::Replace(Self::new(
            self.from,
            self.from + self.slice.size(),
            doc.slice(self.from, self.to)?,
            false,
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.from, Assoc::After);
        let to = mapping.map_result(self.to, Assoc::Before);
        if from.deleted_across() && to.deleted_across() {
            return None;
        }
        Some(Step::Replace(Self::new(
            from.pos,
            from.pos.max(to.pos),
            self.slice.clone(),
            self.structure,
        )))
    }

    fn merge(&self, other: &ReplaceStep) -> Option<Step> {
        if other.structure || self.structure {
            return None;
        }

        let joined = |first: &Slice, second: &Slice| {
            if first.size() + second.size() == 0 {
                Slice::empty()
            } else {
                Slice::new(
                    first.content().append(second.content()),
                    first.open_start(),
                    second.open_end(),
                )
            }
        };

        if self.from + self.slice.size() == other.from
            && self.slice.open_end() == 0
            && other.slice.open_start() == 0
        {
            Some(Step::Replace(Self::new(
                self.from,
                self.to + (other.to - other.from),
                joined(&self.slice, &other.slice),
                false,
            )))
        } else if other.to == self.from
            && self.slice.open_start() == 0
            && other.slice.open_end() == 0
        {
            Some(Step::Replace(Self::new(
                other.from,
                self.to,
                joined(&other.slice, &self.slice),
                false,
            )))
        } else {
            None
        }
    }
}

impl ReplaceAroundStep {
    #[must_use]
    pub fn new(
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
        structure: bool,
    ) -> Self {
        Self {
            from,
            to,
            gap_from,
            gap_to,
            slice,
            insert,
            structure,
        }
    }

    pub fn from(&self) -> usize { self.from }

    pub fn to(&self) -> usize { self.to }

    pub fn gap_from(&self) -> usize { self.gap_from }

    pub fn gap_to(&self) -> usize { self.gap_to }

    pub fn slice(&self) -> &Slice { &self.slice }

    pub fn insert(&self) -> usize { self.insert }

    pub fn structure(&self) -> bool { self.structure }

    fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        if self.structure
            && (content_between(doc, self.from, self.gap_from)?
                || content_between(doc, self.gap_to, self.to)?)
        {
            return Err(StepError(
                "Structure gap-replace would overwrite content".to_owned(),
            ));
        }

        let gap = doc.slice(self.gap_from, self.gap_to)?;
        if gap.open_start() > 0 || gap.open_end() > 0 {
            return Err(StepError("Gap is not a flat range".to_owned()));
        }
        let inserted = self
            .slice
            .insert_at(self.insert, gap.content())
            .ok_or_else(|| StepError("Content does not fit in gap".to_owned()))?;

        Ok(doc.replace(self.from, self.to, &inserted)?)
    }

    fn get_map(&self) -> StepMap {
        StepMap::new(&[
            (self.from, self.gap_from - self.from, self.insert),
            (
                self.gap_to,
                self.to - self.gap_to,
                self.slice.size() - self.insert,
            ),
        ])
    }

    fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        let gap = self.gap_to - self.gap_from;
        let removed = doc
            .slice(self.from, self.to)?
            .remove_between(self.gap_from - self.from, self.gap_to - self.from)?;

        Ok(Step::ReplaceAround(Self::new(
            self.from,
            self.from + self.slice.size() + gap,
            self.from + self.insert,
            self.from + self.insert + gap,
            removed,
            self.gap_from - self.from,
            self.structure,
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.from, Assoc::After);
        let to = mapping.map_result(self.to, Assoc::Before);
        let gap_from = if self.from == self.gap_from {
            from.pos
        } else {
            mapping.map(self.gap_from, Assoc::Before)
        };
        let gap_to = if self.to == self.gap_to {
            to.pos
        } else {
            mapping.map(self.gap_to, Assoc::After)
        };

        if (from.deleted_across() && to.deleted_across()) || gap_from < from.pos || gap_to > to.pos {
            return None;
        }
        Some(Step::ReplaceAround(Self::new(
            from.pos,
            to.pos,
            gap_from,
            gap_to,
            self.slice.clone(),
            self.insert,
            self.structure,
        )))
    }
}

/// Whether replacing `from..to` would delete anything beyond the closing and
/// opening tokens of the nodes around it.
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, StepError> {
    let resolved = doc.resolve(from)?;
    let mut dist = to - from;
    let mut depth = resolved.depth();

    while dist > 0
        && depth > 0
        && resolved.index_after(depth) == resolved.node(depth).child_count()
    {
        depth -= 1;
        dist -= 1;
    }

    if dist > 0 {
        let mut next = resolved
            .node(depth)
            .maybe_child(resolved.index_after(depth))
            .cloned();
        while dist > 0 {
            match next {
                Some(node) if !node.is_leaf() => next = node.first_child().cloned(),
                _ => return Ok(true),
            }
            dist -= 1;
        }
    }

    Ok(false)
}

/// Rebuilds `fragment`, passing every inline node and its parent through `f`.
fn map_fragment<F>(fragment: &Fragment, parent: &Node, f: &F) -> Fragment
where
    F: Fn(&Node, &Node) -> Node,
{
    let mapped = fragment
        .iter()
        .map(|child| {
            let child = if child.content_size() > 0 {
                child.copy(map_fragment(child.content(), child, f))
            } else {
                child.clone()
            };
            if child.is_inline() {
                f(&child, parent)
            } else {
                child
            }
        })
        .collect();
    Fragment::from_vec(mapped)
}

fn apply_marks<F>(doc: &Node, from: usize, to: usize, f: &F) -> Result<Node, StepError>
where
    F: Fn(&Node, &Node) -> Node,
{
    let old_slice = doc.slice(from, to)?;
    let resolved = doc.resolve(from)?;
    let parent = resolved.node(resolved.shared_depth(to));
    let slice = Slice::new(
        map_fragment(old_slice.content(), parent, f),
        old_slice.open_start(),
        old_slice.open_end(),
    );
    Ok(doc.replace(from, to, &slice)?)
}

impl AddMarkStep {
    #[must_use]
    pub fn new(from: usize, to: usize, mark: Mark) -> Self { Self { from, to, mark } }

    pub fn from(&self) -> usize { self.from }

    pub fn to(&self) -> usize { self.to }

    pub fn mark(&self) -> &Mark { &self.mark }

    fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        apply_marks(doc, self.from, self.to, &|node: &Node, parent: &Node| {
            if !node.is_leaf() || !parent.node_type().allows_mark_type(self.mark.mark_type()) {
                return node.clone();
            }
            node.mark(self.mark.add_to_set(node.marks()))
        })
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.from, Assoc::After);
        let to = mapping.map_result(self.to, Assoc::Before);
        if (from.deleted() && to.deleted()) || from.pos >= to.pos {
            return None;
        }
        Some(Step::AddMark(Self::new(from.pos, to.pos, self.mark.clone())))
    }
}

impl RemoveMarkStep {
    #[must_use]
    pub fn new(from: usize, to: usize, mark: Mark) -> Self { Self { from, to, mark } }

    pub fn from(&self) -> usize { self.from }

    pub fn to(&self) -> usize { self.to }

    pub fn mark(&self) -> &Mark { &self.mark }

    fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        apply_marks(doc, self.from, self.to, &|node: &Node, _: &Node| {
            node.mark(self.mark.remove_from_set(node.marks()))
        })
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.from, Assoc::After);
        let to = mapping.map_result(self.to, Assoc::Before);
        if (from.deleted() && to.deleted()) || from.pos >= to.pos {
            return None;
        }
        Some(Step::RemoveMark(Self::new(from.pos, to.pos, self.mark.clone())))
    }
}

/// Overlapping or touching ranges carrying the same mark merge into one.
fn merge_mark_ranges(a: (usize, usize), b: (usize, usize)) -> Option<(usize, usize)> {
    (a.0 <= b.1 && a.1 >= b.0).then(|| (a.0.min(b.0), a.1.max(b.1)))
}

impl Step {
    /// The document range the step was created for.
    pub fn range(&self) -> (usize, usize) {
        match self {
            Step::Replace(step) => (step.from, step.to),
            Step::ReplaceAround(step) => (step.from, step.to),
            Step::AddMark(step) => (step.from, step.to),
            Step::RemoveMark(step) => (step.from, step.to),
        }
    }

    pub fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        match self {
            Step::Replace(step) => step.apply(doc),
            Step::ReplaceAround(step) => step.apply(doc),
            Step::AddMark(step) => step.apply(doc),
            Step::RemoveMark(step) => step.apply(doc),
        }
    }

    /// How the step moves positions. Mark steps move nothing.
    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace(step) => step.get_map(),
            Step::ReplaceAround(step) => step.get_map(),
            Step::AddMark(_) | Step::RemoveMark(_) => StepMap::empty(),
        }
    }

    /// A step undoing this one, given the document it was applied to.
    pub fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        match self {
            Step::Replace(step) => step.invert(doc),
            Step::ReplaceAround(step) => step.invert(doc),
            Step::AddMark(step) => Ok(Step::RemoveMark(RemoveMarkStep::new(
                step.from,
                step.to,
                step.mark.clone(),
            ))),
            Step::RemoveMark(step) => Ok(Step::AddMark(AddMarkStep::new(
                step.from,
                step.to,
                step.mark.clone(),
            ))),
        }
    }

    /// The step re-targeted through `mapping`, or `None` when the content it
    /// applied to was deleted.
    pub fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        match self {
            Step::Replace(step) => step.map(mapping),
            Step::ReplaceAround(step) => step.map(mapping),
            Step::AddMark(step) => step.map(mapping),
            Step::RemoveMark(step) => step.map(mapping),
        }
    }

    /// Fuses this step with `other`, applied directly after it, when the two
    /// can be expressed as a single step.
    pub fn merge(&self, other: &Step) -> Option<Step> {
        match (self, other) {
            (Step::Replace(a), Step::Replace(b)) => a.merge(b),
            (Step::AddMark(a), Step::AddMark(b)) if a.mark == b.mark => {
                merge_mark_ranges((a.from, a.to), (b.from, b.to))
                    .map(|(from, to)| Step::AddMark(AddMarkStep::new(from, to, a.mark.clone())))
            }
            (Step::RemoveMark(a), Step::RemoveMark(b)) if a.mark == b.mark => {
                merge_mark_ranges((a.from, a.to), (b.from, b.to)).map(|(from, to)| {
                    Step::RemoveMark(RemoveMarkStep::new(from, to, a.mark.clone()))
                })
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> StepJson {
        match self {
            Step::Replace(step) => StepJson::Replace {
                from: step.from,
                to: step.to,
                slice: step.slice.to_json(),
                structure: step.structure,
            },
            Step::ReplaceAround(step) => StepJson::ReplaceAround {
                from: step.from,
                to: step.to,
                gap_from: step.gap_from,
                gap_to: step.gap_to,
                slice: step.slice.to_json(),
                insert: step.insert,
                structure: step.structure,
            },
            Step::AddMark(step) => StepJson::AddMark {
                from: step.from,
                to: step.to,
                mark: step.mark.to_json(),
            },
            Step::RemoveMark(step) => StepJson::RemoveMark {
                from: step.from,
                to: step.to,
                mark: step.mark.to_json(),
            },
        }
    }

    pub fn from_json(schema: &Schema, json: &StepJson) -> Result<Step, ModelError> {
        let ordered = match json {
            StepJson::Replace { from, to, .. }
            | StepJson::AddMark { from, to, .. }
            | StepJson::RemoveMark { from, to, .. } => from <= to,
            StepJson::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                ..
            } => from <= gap_from && gap_from <= gap_to && gap_to <= to,
        };
        if !ordered {
            return Err(ModelError::InvalidJson(format!("Step positions out of order: {json:?}")));
        }

        let step = match json {
            StepJson::Replace {
                from,
                to,
                slice,
                structure,
            } => Step::Replace(ReplaceStep::new(
                *from,
                *to,
                Slice::from_json(schema, slice.as_ref())?,
                *structure,
            )),
            StepJson::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
                structure,
            } => Step::ReplaceAround(ReplaceAroundStep::new(
                *from,
                *to,
                *gap_from,
                *gap_to,
                Slice::from_json(schema, slice.as_ref())?,
                *insert,
                *structure,
            )),
            StepJson::AddMark { from, to, mark } => Step::AddMark(AddMarkStep::new(
                *from,
                *to,
                schema.mark(&mark.mark_type, &mark.attrs)?,
            )),
            StepJson::RemoveMark { from, to, mark } => Step::RemoveMark(RemoveMarkStep::new(
                *from,
                *to,
                schema.mark(&mark.mark_type, &mark.attrs)?,
            )),
        };

        if let Step::ReplaceAround(around) = &step
            && around.insert > around.slice.size()
        {
            return Err(ModelError::InvalidJson(format!(
                "Insert position {} outside of the slice",
                around.insert
            )));
        }
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{
        Attrs,
        test_helpers::{doc, h, marked, node, p, schema, text},
    };

    fn replace(from: usize, to: usize, slice: Slice) -> Step {
        Step::Replace(ReplaceStep::new(from, to, slice, false))
    }

    fn text_slice(value: &str) -> Slice { Slice::new(Fragment::from_node(text(value)), 0, 0) }

    fn em() -> Mark { schema().mark("em", &Attrs::new()).unwrap() }

    #[test]
    fn test_replace_apply_and_invert() {
        let document = doc(vec![p("hello world")]);
        let step = replace(7, 12, text_slice("there"));

        let changed = step.apply(&document).unwrap();
        assert_eq!(changed, doc(vec![p("hello there")]));

        let inverse = step.invert(&document).unwrap();
        assert_eq!(inverse.apply(&changed).unwrap(), document);
    }

    #[test]
    fn test_replace_failure_is_reported() {
        let document = doc(vec![p("one"), node("blockquote", vec![p("two")])]);
        let step = replace(4, 6, Slice::empty());

        assert_eq!(
            step.apply(&document),
            Err(StepError("Cannot join blockquote onto paragraph".to_owned()))
        );
    }

    #[test]
    fn test_structure_replace() {
        let document = doc(vec![p("ab"), p("cd")]);

        let joining = Step::Replace(ReplaceStep::new(3, 5, Slice::empty(), true));
        assert_eq!(joining.apply(&document).unwrap(), doc(vec![p("abcd")]));

        let overwriting = Step::Replace(ReplaceStep::new(2, 5, Slice::empty(), true));
        assert_eq!(
            overwriting.apply(&document),
            Err(StepError("Structure replace would overwrite content".to_owned()))
        );
    }

    #[test]
    fn test_replace_around_changes_markup() {
        let document = doc(vec![p("title"), p("body")]);
        let step = Step::ReplaceAround(ReplaceAroundStep::new(
            0,
            7,
            1,
            6,
            Slice::new(Fragment::from_node(h(2, "x").copy(Fragment::empty())), 0, 0),
            1,
            true,
        ));

        let changed = step.apply(&document).unwrap();
        assert_eq!(changed, doc(vec![h(2, "title"), p("body")]));
        assert_eq!(step.get_map().map_result(3, Assoc::After).pos, 3);

        let inverse = step.invert(&document).unwrap();
        assert_eq!(inverse.apply(&changed).unwrap(), document);
    }

    #[test]
    fn test_mark_steps() {
        let document = doc(vec![p("hello")]);
        let add = Step::AddMark(AddMarkStep::new(2, 4, em()));

        let marked_doc = add.apply(&document).unwrap();
        assert_eq!(
            marked_doc,
            doc(vec![node(
                "paragraph",
                vec![text("h"), marked("el", &["em"]), text("lo")]
            )])
        );
        assert!(add.get_map().is_empty());

        let remove = add.invert(&document).unwrap();
        assert_eq!(remove.apply(&marked_doc).unwrap(), document);
    }

    #[test]
    fn test_map() {
        let step = replace(5, 7, text_slice("x"));

        let shifted = step.map(&StepMap::new(&[(1, 0, 3)])).unwrap();
        assert_eq!(shifted.range(), (8, 10));

        assert_eq!(step.map(&StepMap::new(&[(4, 4, 0)])), None);

        let mark = Step::AddMark(AddMarkStep::new(2, 4, em()));
        assert_eq!(mark.map(&StepMap::new(&[(1, 4, 0)])), None);
    }

    #[test]
    fn test_merge() {
        let first = replace(1, 1, text_slice("a"));
        let second = replace(2, 2, text_slice("b"));

        let merged = first.merge(&second).unwrap();
        assert_eq!(merged, replace(1, 1, text_slice("ab")));

        let deletion = replace(3, 4, Slice::empty());
        let earlier_deletion = replace(2, 3, Slice::empty());
        assert_eq!(deletion.merge(&earlier_deletion), Some(replace(2, 4, Slice::empty())));

        assert_eq!(first.merge(&replace(5, 5, text_slice("c"))), None);

        let a = Step::AddMark(AddMarkStep::new(1, 3, em()));
        let b = Step::AddMark(AddMarkStep::new(3, 5, em()));
        assert_eq!(a.merge(&b), Some(Step::AddMark(AddMarkStep::new(1, 5, em()))));
    }

    #[test]
    fn test_json_round_trip() {
        let steps = vec![
            replace(7, 12, text_slice("there")),
            Step::Replace(ReplaceStep::new(3, 5, Slice::empty(), true)),
            Step::AddMark(AddMarkStep::new(2, 4, em())),
        ];

        let json = serde_json::to_value(steps.iter().map(Step::to_json).collect::<Vec<_>>()).unwrap();
        assert_eq!(
            json,
            json!([
                {
                    "stepType": "replace",
                    "from": 7,
                    "to": 12,
                    "slice": { "content": [{ "type": "text", "text": "there" }] }
                },
                { "stepType": "replace", "from": 3, "to": 5, "structure": true },
                { "stepType": "addMark", "from": 2, "to": 4, "mark": { "type": "em" } }
            ])
        );

        let parsed: Vec<StepJson> = serde_json::from_value(json).unwrap();
        let schema = schema();
        let restored = parsed
            .iter()
            .map(|json| Step::from_json(&schema, json))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(restored, steps);
    }

    #[test]
    fn test_json_with_reversed_positions_is_rejected() {
        let schema = schema();
        let reversed = [
            json!({ "stepType": "replace", "from": 5, "to": 3 }),
            json!({ "stepType": "addMark", "from": 4, "to": 2, "mark": { "type": "em" } }),
            json!({ "stepType": "replaceAround", "from": 0, "to": 6, "gapFrom": 4, "gapTo": 2, "insert": 0 }),
            json!({ "stepType": "replaceAround", "from": 0, "to": 6, "gapFrom": 1, "gapTo": 5, "insert": 1 }),
        ];

        for json in reversed {
            let parsed: StepJson = serde_json::from_value(json).unwrap();
            assert!(matches!(
                Step::from_json(&schema, &parsed),
                Err(ModelError::InvalidJson(_))
            ));
        }
    }
}
