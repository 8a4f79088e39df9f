use tracing::debug;

use super::{
    MergeOutcome,
    conflicts::{ChangeOrigin, Conflict, ConflictingChanges, ConflictingStep},
};
use crate::{
    changeset::ChangeSet,
    errors::MergeError,
    model::{ModelError, Node},
    transform::{Mappable, Mapping, StepMap, Transform},
    utils::side::Side,
};

/// The result of a three-way merge: the merged document, the changes that
/// were merged automatically and the conflicting steps still waiting for a
/// decision.
///
/// Resolving a conflict returns a new `Merge`; the old one stays valid.
#[derive(Debug, Clone)]
pub struct Merge {
    doc: Node,
    changes: ChangeSet<ChangeOrigin>,
    conflicts: Vec<Conflict>,
    left_steps: Vec<ConflictingStep>,
    right_steps: Vec<ConflictingStep>,
    conflicting_changes: ConflictingChanges,
}

impl Merge {
    pub(crate) fn new(
        doc: Node,
        changes: ChangeSet<ChangeOrigin>,
        conflicts: Vec<Conflict>,
        left_steps: Vec<ConflictingStep>,
        right_steps: Vec<ConflictingStep>,
        conflicting_changes: ConflictingChanges,
    ) -> Self {
        Self {
            doc,
            changes,
            conflicts,
            left_steps,
            right_steps,
            conflicting_changes,
        }
    }

    pub fn doc(&self) -> &Node { &self.doc }

    /// Changes relative to the common ancestor, tagged with the side that made
    /// them.
    pub fn changes(&self) -> &ChangeSet<ChangeOrigin> { &self.changes }

    pub fn conflicts(&self) -> &[Conflict] { &self.conflicts }

    pub fn conflicting_steps(&self, side: Side) -> &[ConflictingStep] {
        match side {
            Side::Left => &self.left_steps,
            Side::Right => &self.right_steps,
        }
    }

    pub fn conflicting_changes(&self) -> &ConflictingChanges { &self.conflicting_changes }

    /// No steps are waiting for a decision.
    pub fn is_resolved(&self) -> bool { self.left_steps.is_empty() && self.right_steps.is_empty() }

    fn find_step(&self, side: Side, index: usize) -> Result<&ConflictingStep, MergeError> {
        self.conflicting_steps(side)
            .iter()
            .find(|pending| pending.index == index)
            .ok_or(MergeError::UnknownStep { side, index })
    }

    /// Maps the pending steps of one side, dropping the ones that no longer
    /// apply along with their conflicts and previews.
    fn map_pending(
        steps: &[ConflictingStep],
        side: Side,
        mapping: &dyn Mappable,
        conflicts: &mut Vec<Conflict>,
        previews: &mut ConflictingChanges,
    ) -> Vec<ConflictingStep> {
        steps
            .iter()
            .filter_map(|pending| {
                let mapped = pending.step.map(mapping);
                if mapped.is_none() {
                    conflicts.retain(|conflict| conflict.index(side) != pending.index);
                    *previews = previews.without(side, pending.index);
                }
                mapped.map(|step| ConflictingStep {
                    index: pending.index,
                    step,
                })
            })
            .collect()
    }

    /// Follows a change of the merged document made outside of the merge,
    /// described by `mapping` and resulting in `doc`.
    pub fn map(&self, mapping: &Mapping, doc: Node) -> Result<Merge, ModelError> {
        let changes = self
            .changes
            .add_steps(&doc, mapping.maps(), ChangeOrigin::by_user(Side::Right))?;
        let mut conflicts = self.conflicts.clone();
        let mut previews = self.conflicting_changes.clone();

        let left_steps = Self::map_pending(&self.left_steps, Side::Left, mapping, &mut conflicts, &mut previews);
        let right_steps = Self::map_pending(&self.right_steps, Side::Right, mapping, &mut conflicts, &mut previews);

        Ok(Merge::new(
            doc,
            changes,
            conflicts,
            left_steps,
            right_steps,
            previews.map(mapping),
        ))
    }

    /// Applies the pending step `index` of `side` to the merged document.
    pub fn apply(&self, side: Side, index: usize) -> Result<MergeOutcome, MergeError> {
        let step = self.find_step(side, index)?.step.clone();
        let map = step.get_map();

        let mut tr = Transform::new(self.doc.clone());
        tr.step(step).map_err(|reason| MergeError::StepRejected { side, index, reason })?;
        debug!(%side, index, "Applied conflicting step");

        let changes = self
            .changes
            .add_steps(tr.doc(), std::slice::from_ref(&map), ChangeOrigin::by_user(side))?;
        let mut conflicts: Vec<Conflict> = self
            .conflicts
            .iter()
            .filter(|conflict| conflict.index(side) != index)
            .copied()
            .collect();
        let mut previews = self.conflicting_changes.without(side, index);

        let remaining = |pending_side: Side| -> Vec<ConflictingStep> {
            self.conflicting_steps(pending_side)
                .iter()
                .filter(|pending| pending_side != side || pending.index != index)
                .cloned()
                .collect()
        };
        let left_steps = Self::map_pending(&remaining(Side::Left), Side::Left, &map, &mut conflicts, &mut previews);
        let right_steps = Self::map_pending(&remaining(Side::Right), Side::Right, &map, &mut conflicts, &mut previews);

        let merge = Merge::new(
            tr.doc().clone(),
            changes,
            conflicts,
            left_steps,
            right_steps,
            previews.map(&map),
        );
        Ok(MergeOutcome { tr, merge })
    }

    /// Drops the pending step `index` of `side` without applying it.
    pub fn reject(&self, side: Side, index: usize) -> Result<Merge, MergeError> {
        self.find_step(side, index)?;
        debug!(%side, index, "Rejected conflicting step");

        let remaining = |pending_side: Side| -> Vec<ConflictingStep> {
            self.conflicting_steps(pending_side)
                .iter()
                .filter(|pending| pending_side != side || pending.index != index)
                .cloned()
                .collect()
        };

        Ok(Merge::new(
            self.doc.clone(),
            self.changes.clone(),
            self.conflicts
                .iter()
                .filter(|conflict| conflict.index(side) != index)
                .copied()
                .collect(),
            remaining(Side::Left),
            remaining(Side::Right),
            self.conflicting_changes.without(side, index),
        ))
    }

    /// Applies every pending step of `side` in order and drops the pending
    /// steps of the other side. Steps that no longer apply are skipped.
    pub fn apply_all(&self, side: Side) -> Result<MergeOutcome, MergeError> {
        let mut tr = Transform::new(self.doc.clone());
        let mut changes = self.changes.clone();

        for pending in self.conflicting_steps(side) {
            let Some(mapped) = pending.step.map(tr.mapping()) else {
                continue;
            };
            if tr.maybe_step(mapped) {
                let map = tr.mapping().maps().last().cloned().unwrap_or_else(StepMap::empty);
                changes = changes.add_steps(tr.doc(), &[map], ChangeOrigin::by_user(side))?;
            }
        }
        debug!(%side, applied = tr.steps().len(), "Applied all conflicting steps");

        let merge = Merge::new(
            tr.doc().clone(),
            changes,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            ConflictingChanges::default(),
        );
        Ok(MergeOutcome { tr, merge })
    }
}
