//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::AttemptId;
use storage::StoreError;

use crate::api::ApiError;

/// Errors emitted by session lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("quiz has no questions to run a session over")]
    EmptyQuiz,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors emitted by the submission coordinator.
///
/// "Already completed" races and missing completion endpoints are not errors
/// here; those map to successful outcomes. Only genuine failures surface,
/// and completion failures still carry the attempt id so a caller can
/// navigate to results regardless.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("completing attempt {attempt_id} failed: {source}")]
    Completion {
        attempt_id: AttemptId,
        source: ApiError,
    },
    #[error("atomic quiz submission failed: {source}")]
    Atomic { source: ApiError },
}

impl SubmissionError {
    /// Attempt id associated with the failed submission, when known.
    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        match self {
            Self::Completion { attempt_id, .. } => Some(*attempt_id),
            Self::Atomic { .. } => None,
        }
    }
}
