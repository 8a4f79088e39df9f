//! Typed JSON patches over the JSON form of documents.
//!
//! Patches are computed and applied on [`NodeJson`] trees rather than on
//! untyped JSON, so every operation targets a node, a node's type, text,
//! attribute or marks. Paths still print as RFC 6901 pointers and whole
//! patches serialize to the RFC 6902 shape.

mod apply;
mod diff;
mod pointer;

use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use apply::{apply_operation, apply_patch, get};
pub use diff::diff;
pub use pointer::{Field, Pointer};

use crate::model::{MarkJson, NodeJson};

/// A value placed by an `add` or `replace` operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Node(Rc<NodeJson>),
    Type(String),
    Text(String),
    Attr(Value),
    Marks(Vec<MarkJson>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: Pointer, value: PatchValue },
    Remove { path: Pointer },
    Replace { path: Pointer, value: PatchValue },
}

impl PatchOp {
    pub fn path(&self) -> &Pointer {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => path,
        }
    }

    pub fn value(&self) -> Option<&PatchValue> {
        match self {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => Some(value),
            PatchOp::Remove { .. } => None,
        }
    }
}

/// Why a single patch operation could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("No target at `{0}`")]
    MissingTarget(String),

    #[error("Value does not fit target `{0}`")]
    InvalidValue(String),

    #[error("Invalid JSON pointer `{0}`")]
    InvalidPointer(String),
}
