//! Reconstructs, tracks and merges changes of rich-text documents.
//!
//! Given two versions of a document, [`recreate_transform`] finds a short
//! list of steps leading from one to the other. A [`ChangeSet`] tracks which
//! ranges a list of steps inserted and deleted, and [`merge_transforms`]
//! combines two transforms of the same document, holding back the steps
//! that touch the same content as conflicts.

mod changeset;
mod diffs;
mod errors;
pub mod json_patch;
mod merge;
mod model;
mod recreate;
mod tokenizer;
mod transform;
mod utils;

pub use changeset::{ChangeSet, ChangeSetConfig, DeletedSpan, Span};
pub use errors::{MergeError, RecreateError};
pub use json_patch::PatchError;
pub use merge::{
    ChangeOrigin, Conflict, ConflictingChanges, ConflictingStep, Merge, MergeOptions, MergeOutcome,
    PendingDeletion, PendingInsertion, merge_transforms,
};
pub use model::{
    Attrs, ElementJson, Fragment, Mark, MarkJson, MarkSpec, MarkType, ModelError, Node, NodeJson, NodeSpec,
    NodeType, ResolvedPos, Schema, SchemaBuilder, Slice, SliceJson, TextJson, basic_schema,
};
pub use recreate::{RecreateOptions, recreate_transform};
pub use tokenizer::{
    Tokenizer, character_tokenizer::character_tokenizer, token::Token, word_tokenizer::word_tokenizer,
};
pub use transform::{
    AddMarkStep, Assoc, MapResult, Mappable, Mapping, MarkMatch, RemoveMarkStep, ReplaceAroundStep,
    ReplaceStep, Step, StepError, StepJson, StepMap, Transform,
};
pub use utils::{
    deadline::{Deadline, TimedOut},
    side::Side,
};
