use thiserror::Error;

use crate::{model::ModelError, transform::StepError, utils::deadline::TimedOut, utils::side::Side};

/// Fatal failures while reconstructing the steps between two documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecreateError {
    /// No prefix of the remaining patch produces a valid document.
    #[error("No valid diff possible!")]
    NoValidDiff,

    /// A reconstructed step did not apply.
    #[error("No valid step found.")]
    NoValidStep,

    #[error("Diff timed out!")]
    TimedOut,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Step(#[from] StepError),
}

impl From<TimedOut> for RecreateError {
    fn from(_: TimedOut) -> Self { RecreateError::TimedOut }
}

/// Failures while resolving the conflicts of a merge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("No pending step {index} on the {side} side")]
    UnknownStep { side: Side, index: usize },

    #[error("Step {index} of the {side} side no longer applies: {reason}")]
    StepRejected {
        side: Side,
        index: usize,
        reason: StepError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Recreate(#[from] RecreateError),
}
