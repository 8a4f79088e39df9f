//! Three-way merging of two transforms that start from the same document.
//!
//! Steps of both sides that touch the same content are held back as
//! conflicts; everything else is merged automatically, with the left side's
//! steps applied first. The held back edits are reconstructed as plain
//! replace steps on top of the merged document, where they can be applied
//! or rejected one by one.

mod conflicts;
mod rebase;
mod resolution;

use std::{collections::BTreeSet, time::Duration};

pub use conflicts::{
    ChangeOrigin, Conflict, ConflictingChanges, ConflictingStep, PendingDeletion, PendingInsertion,
};
use conflicts::{find_conflicts, pending_steps};
use rebase::rebase_steps;
pub use resolution::Merge;
use tracing::debug;

use crate::{
    changeset::{ChangeSet, ChangeSetConfig},
    errors::RecreateError,
    model::Node,
    recreate::{RecreateOptions, recreate_transform},
    transform::{Mapping, Transform},
    utils::side::Side,
};

/// Tunes [`merge_transforms`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Merge the steps that do not conflict. When off, the merged document is
    /// the common ancestor and every edit becomes a conflicting step.
    pub automerge: bool,

    /// Treat the left side as the truth and offer the right side's remaining
    /// edits as a list of independent steps, without conflict pairs.
    pub rebase: bool,

    /// Reconstruct text changes word by word.
    pub word_diffs: bool,

    /// Time budget for each reconstruction.
    pub timeout: Option<Duration>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            automerge: true,
            rebase: false,
            word_diffs: false,
            timeout: None,
        }
    }
}

/// The merged transform, leading from the common ancestor to the merged
/// document, and the merge state holding the conflicts.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub tr: Transform,
    pub merge: Merge,
}

/// Merges `left` and `right`, two transforms of the same document.
///
/// ## Example
///
/// ```
/// use reconcile_doc::{Fragment, MergeOptions, Node, Transform, basic_schema, merge_transforms};
/// use serde_json::json;
///
/// let schema = basic_schema().unwrap();
/// let json = json!({
///     "type": "doc",
///     "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": "The quick fox" }] }]
/// });
/// let base = Node::from_json(&schema, &serde_json::from_value(json).unwrap()).unwrap();
///
/// let mut left = Transform::new(base.clone());
/// left.insert(11, Fragment::from_node(schema.text("brown ", vec![]).unwrap())).unwrap();
///
/// let mut right = Transform::new(base);
/// right.replace_with(5, 10, Fragment::from_node(schema.text("slow", vec![]).unwrap())).unwrap();
///
/// let outcome = merge_transforms(&left, &right, &MergeOptions::default()).unwrap();
///
/// assert!(outcome.merge.conflicts().is_empty());
/// assert_eq!(outcome.merge.doc().text_content(), "The slow brown fox");
/// ```
pub fn merge_transforms(
    left: &Transform,
    right: &Transform,
    options: &MergeOptions,
) -> Result<MergeOutcome, RecreateError> {
    debug!(
        left_steps = left.steps().len(),
        right_steps = right.steps().len(),
        automerge = options.automerge,
        rebase = options.rebase,
        "Merging transforms"
    );

    let base = left.before();
    let Automerged {
        tr,
        changes,
        left_clean,
        right_clean,
    } = if options.automerge {
        automerge(left, right)?
    } else {
        Automerged::unmerged(base)
    };

    let remainder_options = RecreateOptions {
        complex_steps: false,
        word_diffs: options.word_diffs,
        timeout: options.timeout,
    };
    let left_conflicts = remainder(&left_clean, left, &tr, &remainder_options)?;
    let right_conflicts = remainder(&right_clean, right, &tr, &remainder_options)?;

    if options.rebase {
        return rebase_merged(left.doc(), left_conflicts.doc(), right_conflicts.doc(), options);
    }

    let conflicts = find_conflicts(&left_conflicts, &right_conflicts)?;
    let mut previews = ConflictingChanges::default();
    let left_steps = pending_steps(&left_conflicts, Side::Left, &mut previews)?;
    let right_steps = pending_steps(&right_conflicts, Side::Right, &mut previews)?;

    debug!(
        conflicts = conflicts.len(),
        left_pending = left_steps.len(),
        right_pending = right_steps.len(),
        "Merged transforms"
    );
    let merge = Merge::new(tr.doc().clone(), changes, conflicts, left_steps, right_steps, previews);
    Ok(MergeOutcome { tr, merge })
}

struct Automerged {
    tr: Transform,
    changes: ChangeSet<ChangeOrigin>,
    left_clean: Transform,
    right_clean: Transform,
}

impl Automerged {
    fn unmerged(base: &Node) -> Self {
        Self {
            tr: Transform::new(base.clone()),
            changes: ChangeSet::create(base.clone(), ChangeSetConfig::never_compatible()),
            left_clean: Transform::new(base.clone()),
            right_clean: Transform::new(base.clone()),
        }
    }
}

/// Applies the conflict-free steps of the left side, then the conflict-free
/// steps of the right side rebased over them.
fn automerge(left: &Transform, right: &Transform) -> Result<Automerged, RecreateError> {
    let base = left.before();
    let conflicts = find_conflicts(left, right)?;
    let left_clean = without_steps(left, &conflicts.iter().map(|conflict| conflict.left).collect());
    let right_clean = without_steps(right, &conflicts.iter().map(|conflict| conflict.right).collect());

    let mut tr = Transform::new(base.clone());
    for step in left_clean.steps() {
        tr.maybe_step(step.clone());
    }
    let changes = ChangeSet::create(base.clone(), ChangeSetConfig::never_compatible()).add_steps(
        tr.doc(),
        tr.mapping().maps(),
        ChangeOrigin::by_user(Side::Left),
    )?;

    let left_count = tr.steps().len();
    let left_mapping = tr.mapping().clone();
    rebase_steps(&right_clean, &left_mapping, &mut tr, |_| false);
    let changes = changes.add_steps(
        tr.doc(),
        &tr.mapping().maps()[left_count..],
        ChangeOrigin::by_user(Side::Right),
    )?;

    debug!(
        conflicts = conflicts.len(),
        merged_steps = tr.steps().len(),
        "Automerged conflict-free steps"
    );
    Ok(Automerged {
        tr,
        changes,
        left_clean,
        right_clean,
    })
}

/// `tr` without the steps in `removed` and without the content they created.
fn without_steps(tr: &Transform, removed: &BTreeSet<usize>) -> Transform {
    let mut clean = Transform::new(tr.before().clone());
    rebase_steps(tr, &Mapping::new(), &mut clean, |index| removed.contains(&index));
    clean
}

/// The edits `clean` is missing to reach the final document of `full`, as
/// replace steps on top of the merged document of `merged`.
fn remainder(
    clean: &Transform,
    full: &Transform,
    merged: &Transform,
    options: &RecreateOptions,
) -> Result<Transform, RecreateError> {
    let missing = recreate_transform(clean.doc(), full.doc(), options)?;

    let mut to_merged = clean.mapping().invert();
    to_merged.append_mapping(merged.mapping());

    let mut rebased = Transform::new(merged.doc().clone());
    rebase_steps(&missing, &to_merged, &mut rebased, |_| false);
    Ok(rebased)
}

/// Makes the left document the merged document: the right side's merged
/// edits become regular changes and its conflicting edits pending steps.
fn rebase_merged(
    doc: &Node,
    non_conflicting_doc: &Node,
    conflicting_doc: &Node,
    options: &MergeOptions,
) -> Result<MergeOutcome, RecreateError> {
    let tr = recreate_transform(
        doc,
        non_conflicting_doc,
        &RecreateOptions {
            complex_steps: true,
            word_diffs: options.word_diffs,
            timeout: options.timeout,
        },
    )?;
    let changes = ChangeSet::create(doc.clone(), ChangeSetConfig::never_compatible()).add_steps(
        tr.doc(),
        tr.mapping().maps(),
        ChangeOrigin::by_user(Side::Right),
    )?;

    let conflicting = recreate_transform(
        tr.doc(),
        conflicting_doc,
        &RecreateOptions {
            complex_steps: false,
            word_diffs: options.word_diffs,
            timeout: options.timeout,
        },
    )?;
    let mut previews = ConflictingChanges::default();
    let right_steps = pending_steps(&conflicting, Side::Right, &mut previews)?;

    debug!(pending = right_steps.len(), "Rebased merge on the left document");
    let merge = Merge::new(tr.doc().clone(), changes, Vec::new(), Vec::new(), right_steps, previews);
    Ok(MergeOutcome { tr, merge })
}
