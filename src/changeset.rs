//! Tracks the inserted and deleted ranges of a document relative to the
//! document the tracking started from.

mod span;

use std::{
    fmt::{self, Debug},
    rc::Rc,
};

pub use span::{DeletedSpan, Span};
use span::subtract;
use tracing::trace;

use crate::{
    diffs::raw_operation::RawOperation,
    model::{ModelError, Node, Slice},
    tokenizer::position_tokenizer::slice_tokenizer,
    transform::{Assoc, Mappable, Mapping, StepMap},
    utils::deadline::Deadline,
};

/// Decides when spans with different metadata may be joined, and what the
/// joined span's metadata becomes.
pub struct ChangeSetConfig<D> {
    compare: Rc<dyn Fn(&D, &D) -> bool>,
    combine: Rc<dyn Fn(&D, &D) -> D>,
}

impl<D> ChangeSetConfig<D> {
    pub fn new<C, M>(compare: C, combine: M) -> Self
    where
        C: Fn(&D, &D) -> bool + 'static,
        M: Fn(&D, &D) -> D + 'static,
    {
        Self {
            compare: Rc::new(compare),
            combine: Rc::new(combine),
        }
    }

    pub fn compatible(&self, a: &D, b: &D) -> bool { (self.compare)(a, b) }

    pub fn combine(&self, a: &D, b: &D) -> D { (self.combine)(a, b) }
}

impl<D: Clone + 'static> ChangeSetConfig<D> {
    /// Never joins spans, so every span keeps the metadata of its own edit.
    #[must_use]
    pub fn never_compatible() -> Self { Self::new(|_, _| false, |a: &D, _| a.clone()) }
}

impl<D: PartialEq + Clone + 'static> Default for ChangeSetConfig<D> {
    /// Joins spans with equal metadata.
    fn default() -> Self { Self::new(|a: &D, b: &D| a == b, |a: &D, _| a.clone()) }
}

impl<D> Clone for ChangeSetConfig<D> {
    fn clone(&self) -> Self {
        Self {
            compare: Rc::clone(&self.compare),
            combine: Rc::clone(&self.combine),
        }
    }
}

impl<D> Debug for ChangeSetConfig<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSetConfig").finish_non_exhaustive()
    }
}

/// The changes between a start document and the current document, as
/// inserted ranges of the current document and deleted ranges of the start
/// document.
///
/// A `ChangeSet` is never modified; [`ChangeSet::add_steps`] returns a new
/// one.
#[derive(Debug, Clone)]
pub struct ChangeSet<D> {
    config: ChangeSetConfig<D>,
    start_doc: Node,
    mapping: Mapping,
    inserted: Vec<Span<D>>,
    deleted: Vec<DeletedSpan<D>>,
}

impl<D> ChangeSet<D>
where
    D: Clone + Debug,
{
    #[must_use]
    pub fn create(doc: Node, config: ChangeSetConfig<D>) -> Self {
        Self {
            config,
            start_doc: doc,
            mapping: Mapping::new(),
            inserted: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn start_doc(&self) -> &Node { &self.start_doc }

    /// Inserted ranges of the current document, ordered by position.
    pub fn inserted(&self) -> &[Span<D>] { &self.inserted }

    /// Deleted ranges of the start document, ordered by position.
    pub fn deleted(&self) -> &[DeletedSpan<D>] { &self.deleted }

    pub fn config(&self) -> &ChangeSetConfig<D> { &self.config }

    /// Records the changes of `maps`, which lead from the current document to
    /// `new_doc`, under `data`.
    pub fn add_steps(&self, new_doc: &Node, maps: &[StepMap], data: D) -> Result<Self, ModelError> {
        let mut next = self.clone();
        for map in maps {
            next.add_map(map, &data)?;
        }
        next.coalesce(new_doc)?;

        trace!(
            inserted = next.inserted.len(),
            deleted = next.deleted.len(),
            "Added steps to change set"
        );
        Ok(next)
    }

    fn add_map(&mut self, map: &StepMap, data: &D) -> Result<(), ModelError> {
        let to_start = self.mapping.invert();
        let mut insertions = Vec::new();
        let mut deletions = Vec::new();

        map.for_each(|old_start, old_end, new_start, new_end| {
            // Replaced content inserted earlier simply disappears; only the
            // content of the start document is recorded as deleted.
            let original = if old_end > old_start {
                self.inserted
                    .iter()
                    .fold(vec![(old_start, old_end)], |ranges, span| {
                        subtract(ranges, span.from, span.to)
                    })
            } else {
                Vec::new()
            };

            for (from, to) in original {
                let start_range = (to_start.map(from, Assoc::After), to_start.map(to, Assoc::Before));
                let pieces = self
                    .deleted
                    .iter()
                    .fold(vec![start_range], |ranges, span| subtract(ranges, span.from, span.to));
                deletions.extend(
                    pieces
                        .into_iter()
                        .filter(|(from, to)| from < to)
                        .map(|(from, to)| (from, to, new_start)),
                );
            }

            if new_end > new_start {
                insertions.push((new_start, new_end));
            }
        });

        for span in &mut self.inserted {
            span.from = map.map(span.from, Assoc::After);
            span.to = map.map(span.to, Assoc::Before);
        }
        self.inserted.retain(|span| !span.is_empty());
        for span in &mut self.deleted {
            span.pos = map.map(span.pos, Assoc::Before);
        }

        for (from, to) in insertions {
            self.insert_span(Span::new(from, to, data.clone()));
        }
        for (from, to, pos) in deletions {
            self.delete_span(from, to, pos, data.clone())?;
        }

        self.mapping.append_map(map.clone(), None);
        Ok(())
    }

    fn insert_span(&mut self, mut span: Span<D>) {
        while let Some(index) = self.inserted.iter().position(|existing| {
            existing.touches(span.from, span.to) && self.config.compatible(&existing.data, &span.data)
        }) {
            let existing = self.inserted.remove(index);
            span.from = span.from.min(existing.from);
            span.to = span.to.max(existing.to);
            span.data = self.config.combine(&existing.data, &span.data);
        }

        // Incompatible spans give way to the new one.
        self.inserted = std::mem::take(&mut self.inserted)
            .into_iter()
            .flat_map(|existing| {
                subtract(vec![(existing.from, existing.to)], span.from, span.to)
                    .into_iter()
                    .map(move |(from, to)| Span::new(from, to, existing.data.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        self.inserted.push(span);
        self.inserted.sort_by_key(|span| span.from);
    }

    fn delete_span(&mut self, from: usize, to: usize, pos: usize, data: D) -> Result<(), ModelError> {
        let mut span = DeletedSpan {
            from,
            to,
            pos,
            slice: Slice::empty(),
            data,
        };

        while let Some(index) = self.deleted.iter().position(|existing| {
            existing.from <= span.to
                && span.from <= existing.to
                && self.config.compatible(&existing.data, &span.data)
        }) {
            let existing = self.deleted.remove(index);
            span.from = span.from.min(existing.from);
            span.to = span.to.max(existing.to);
            span.pos = span.pos.min(existing.pos);
            span.data = self.config.combine(&existing.data, &span.data);
        }

        span.slice = self.start_doc.slice(span.from, span.to)?;
        self.deleted.push(span);
        self.deleted.sort_by_key(|span| span.from);
        Ok(())
    }

    /// Narrows a deletion and the compatible insertion at the same position
    /// down to the tokens that actually differ, when the two share content.
    fn coalesce(&mut self, new_doc: &Node) -> Result<(), ModelError> {
        let mut index = 0;

        while index < self.deleted.len() {
            let deleted = &self.deleted[index];
            let Some(inserted_index) = self.inserted.iter().position(|inserted| {
                inserted.from == deleted.pos && self.config.compatible(&deleted.data, &inserted.data)
            }) else {
                index += 1;
                continue;
            };
            let inserted = &self.inserted[inserted_index];

            let old_tokens = slice_tokenizer(&deleted.slice);
            let new_tokens = slice_tokenizer(&new_doc.slice(inserted.from, inserted.to)?);
            let Ok(runs) = RawOperation::vec_from(&old_tokens, &new_tokens, &Deadline::none()) else {
                index += 1;
                continue;
            };
            if !runs.iter().any(|run| matches!(run, RawOperation::Equal(_))) {
                index += 1;
                continue;
            }

            let deleted = self.deleted.remove(index);
            let inserted = self.inserted.remove(inserted_index);
            let mut old_pos = deleted.from;
            let mut new_pos = inserted.from;
            let mut deleted_pieces = Vec::new();

            for run in &runs {
                let length = run.tokens().len();
                match run {
                    RawOperation::Equal(_) => {
                        old_pos += length;
                        new_pos += length;
                    }
                    RawOperation::Delete(_) => {
                        deleted_pieces.push(DeletedSpan {
                            from: old_pos,
                            to: old_pos + length,
                            pos: new_pos,
                            slice: self.start_doc.slice(old_pos, old_pos + length)?,
                            data: deleted.data.clone(),
                        });
                        old_pos += length;
                    }
                    RawOperation::Insert(_) => {
                        self.inserted
                            .push(Span::new(new_pos, new_pos + length, inserted.data.clone()));
                        new_pos += length;
                    }
                }
            }

            trace!(
                from = deleted.from,
                to = deleted.to,
                pieces = deleted_pieces.len(),
                "Coalesced replacement"
            );
            let added = deleted_pieces.len();
            self.deleted.splice(index..index, deleted_pieces);
            self.inserted.sort_by_key(|span| span.from);
            index += added;
        }
        Ok(())
    }
}
