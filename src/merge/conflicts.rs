use crate::{
    changeset::{ChangeSet, ChangeSetConfig},
    model::{ModelError, Slice},
    transform::{Assoc, Mappable, Step, Transform},
    utils::side::Side,
};

/// Metadata of the spans recorded during a merge: which side made a change
/// and, where it matters, which of its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeOrigin {
    pub user: Option<Side>,
    pub step: Option<usize>,
}

impl ChangeOrigin {
    pub fn by_user(side: Side) -> Self {
        Self {
            user: Some(side),
            step: None,
        }
    }

    pub fn at_step(index: usize) -> Self {
        Self {
            user: None,
            step: Some(index),
        }
    }

    pub fn conflict(side: Side, index: usize) -> Self {
        Self {
            user: Some(side),
            step: Some(index),
        }
    }

    pub fn is_conflict(&self, side: Side, index: usize) -> bool {
        self.user == Some(side) && self.step == Some(index)
    }
}

/// A pair of steps, one from each side, that touch the same content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conflict {
    pub left: usize,
    pub right: usize,
}

impl Conflict {
    pub fn new(left: usize, right: usize) -> Self { Self { left, right } }

    pub fn index(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// A step still waiting to be applied or rejected. Its positions refer to
/// the current merged document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictingStep {
    pub index: usize,
    pub step: Step,
}

/// Content a pending step would insert at `pos` of the merged document.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsertion {
    pub pos: usize,
    pub slice: Slice,
    pub origin: ChangeOrigin,
}

/// A range of the merged document a pending step would delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDeletion {
    pub from: usize,
    pub to: usize,
    pub origin: ChangeOrigin,
}

/// What the pending steps would change if they were applied, for showing
/// conflicts before they are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictingChanges {
    pub inserted: Vec<PendingInsertion>,
    pub deleted: Vec<PendingDeletion>,
}

impl ConflictingChanges {
    pub(crate) fn without(&self, side: Side, index: usize) -> Self {
        Self {
            inserted: self
                .inserted
                .iter()
                .filter(|span| !span.origin.is_conflict(side, index))
                .cloned()
                .collect(),
            deleted: self
                .deleted
                .iter()
                .filter(|span| !span.origin.is_conflict(side, index))
                .copied()
                .collect(),
        }
    }

    pub(crate) fn map(&self, mapping: &dyn Mappable) -> Self {
        Self {
            inserted: self
                .inserted
                .iter()
                .map(|span| PendingInsertion {
                    pos: mapping.map(span.pos, Assoc::After),
                    ..span.clone()
                })
                .collect(),
            deleted: self
                .deleted
                .iter()
                .map(|span| PendingDeletion {
                    from: mapping.map(span.from, Assoc::After),
                    to: mapping.map(span.to, Assoc::After),
                    ..*span
                })
                .collect(),
        }
    }
}

struct Insertion {
    pos: usize,
    step: usize,
}

struct Deletion {
    from: usize,
    to: usize,
    step: usize,
}

/// The insertions and deletions of every step of `tr`, in the coordinates of
/// its first document.
fn content_changes(tr: &Transform) -> Result<(Vec<Insertion>, Vec<Deletion>), ModelError> {
    let mut changes = ChangeSet::create(tr.before().clone(), ChangeSetConfig::never_compatible());
    for (index, map) in tr.mapping().maps().iter().enumerate() {
        let doc = tr.docs().get(index + 1).unwrap_or(tr.doc());
        changes = changes.add_steps(doc, std::slice::from_ref(map), ChangeOrigin::at_step(index))?;
    }

    let to_start = tr.mapping().invert();
    let inserted = changes
        .inserted()
        .iter()
        .filter_map(|span| {
            span.data.step.map(|step| Insertion {
                pos: to_start.map(span.from, Assoc::After),
                step,
            })
        })
        .collect();
    let deleted = changes
        .deleted()
        .iter()
        .filter_map(|span| {
            span.data.step.map(|step| Deletion {
                from: span.from,
                to: span.to,
                step,
            })
        })
        .collect();

    Ok((inserted, deleted))
}

/// Pairs the steps of two transforms from the same document that touch the
/// same content: an insertion inside or at the edge of the other side's
/// deletion, two insertions at the same position, or overlapping deletions.
pub(crate) fn find_conflicts(left: &Transform, right: &Transform) -> Result<Vec<Conflict>, ModelError> {
    let (left_inserted, left_deleted) = content_changes(left)?;
    let (right_inserted, right_deleted) = content_changes(right)?;
    let mut conflicts = Vec::new();
    let mut push = |conflict: Conflict| {
        if !conflicts.contains(&conflict) {
            conflicts.push(conflict);
        }
    };

    for deleted in &left_deleted {
        for inserted in &right_inserted {
            if inserted.pos >= deleted.from && inserted.pos <= deleted.to {
                push(Conflict::new(deleted.step, inserted.step));
            }
        }
    }
    for deleted in &right_deleted {
        for inserted in &left_inserted {
            if inserted.pos >= deleted.from && inserted.pos <= deleted.to {
                push(Conflict::new(inserted.step, deleted.step));
            }
        }
    }
    for left in &left_inserted {
        for right in &right_inserted {
            if left.pos == right.pos {
                push(Conflict::new(left.step, right.step));
            }
        }
    }
    for left in &left_deleted {
        for right in &right_deleted {
            if left.from <= right.to && right.from <= left.to {
                push(Conflict::new(left.step, right.step));
            }
        }
    }

    Ok(conflicts)
}

/// Expresses every step of `tr` in the coordinates of its first document and
/// previews what each would change there on its own.
pub(crate) fn pending_steps(
    tr: &Transform,
    side: Side,
    previews: &mut ConflictingChanges,
) -> Result<Vec<ConflictingStep>, ModelError> {
    let doc = tr.before();
    let mut pending = Vec::new();

    for (index, step) in tr.steps().iter().enumerate() {
        let Some(step) = step.map(&tr.mapping().slice(0, index).invert()) else {
            continue;
        };

        if let Ok(result) = step.apply(doc) {
            // Undoing the step from its result shows what it would change.
            let changes = ChangeSet::create(result, ChangeSetConfig::never_compatible()).add_steps(
                doc,
                &[step.get_map().invert()],
                ChangeOrigin::conflict(side, index),
            )?;
            previews
                .deleted
                .extend(changes.inserted().iter().map(|span| PendingDeletion {
                    from: span.from,
                    to: span.to,
                    origin: span.data,
                }));
            previews
                .inserted
                .extend(changes.deleted().iter().map(|span| PendingInsertion {
                    pos: span.pos,
                    slice: span.slice.clone(),
                    origin: span.data,
                }));
        }

        pending.push(ConflictingStep { index, step });
    }

    Ok(pending)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        Fragment,
        test_helpers::{doc, p, text},
    };

    fn transform(edit: impl FnOnce(&mut Transform)) -> Transform {
        let mut tr = Transform::new(doc(vec![p("The quick fox")]));
        edit(&mut tr);
        tr
    }

    #[test]
    fn test_disjoint_edits_do_not_conflict() {
        let left = transform(|tr| {
            tr.insert(11, Fragment::from_node(text("brown "))).unwrap();
        });
        let right = transform(|tr| {
            tr.replace_with(5, 10, Fragment::from_node(text("slow"))).unwrap();
        });

        assert_eq!(find_conflicts(&left, &right).unwrap(), vec![]);
    }

    #[test]
    fn test_overlapping_deletions_conflict() {
        let left = transform(|tr| {
            tr.delete(1, 8).unwrap();
        });
        let right = transform(|tr| {
            tr.insert(2, Fragment::from_node(text("x"))).unwrap();
            tr.delete(6, 12).unwrap();
        });

        assert_eq!(
            find_conflicts(&left, &right).unwrap(),
            vec![Conflict::new(0, 0), Conflict::new(0, 1)]
        );
    }

    #[test]
    fn test_insertions_at_the_same_position_conflict() {
        let left = transform(|tr| {
            tr.insert(5, Fragment::from_node(text("very "))).unwrap();
        });
        let right = transform(|tr| {
            tr.insert(5, Fragment::from_node(text("not so "))).unwrap();
        });

        assert_eq!(find_conflicts(&left, &right).unwrap(), vec![Conflict::new(0, 0)]);
    }

    #[test]
    fn test_pending_steps_preview() {
        let tr = transform(|tr| {
            tr.replace_with(5, 10, Fragment::from_node(text("slow"))).unwrap();
            tr.insert(1, Fragment::from_node(text("So, "))).unwrap();
        });
        let mut previews = ConflictingChanges::default();

        let pending = pending_steps(&tr, Side::Right, &mut previews).unwrap();

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].step.range(), (1, 1));
        assert_eq!(
            previews.deleted,
            vec![PendingDeletion {
                from: 5,
                to: 10,
                origin: ChangeOrigin::conflict(Side::Right, 0),
            }]
        );
        assert_eq!(previews.inserted.len(), 2);
        assert_eq!(previews.inserted[1].pos, 1);
        let slice = &previews.inserted[1].slice;
        assert_eq!(slice.content().text_between(0, slice.content().size()), "So, ");

        let without = previews.without(Side::Right, 0);
        assert!(without.deleted.is_empty());
        assert_eq!(without.inserted.len(), 1);
    }
}
