//! Abstract contract for the remote attempt API.
//!
//! The backend owns attempts and their responses; this module defines the
//! calls the session manager consumes and the error taxonomy it needs to
//! tell races ("already completed") and backend gaps (missing completion
//! endpoint) apart from genuine failures.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quiz_core::model::{Answer, AttemptId, QuestionId, Quiz, QuizId};

mod http;

pub use http::{ApiConfig, HttpAttemptApi};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The attempt was completed elsewhere (another tab, another request).
    #[error("attempt already completed")]
    AlreadyCompleted,

    #[error("not found")]
    NotFound,

    /// The backend does not implement this endpoint.
    #[error("not implemented by the backend")]
    NotImplemented,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// True for the expected completion race.
    #[must_use]
    pub fn is_already_completed(&self) -> bool {
        matches!(self, Self::AlreadyCompleted)
    }

    /// True when the completion endpoint simply does not exist on this
    /// backend; treated as a fallback success, not a failure.
    #[must_use]
    pub fn is_backend_gap(&self) -> bool {
        matches!(self, Self::NotFound | Self::NotImplemented)
    }
}

//
// ─── WIRE SHAPES ──────────────────────────────────────────────────────────────
//

/// One persisted answer within an attempt, as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDto {
    pub question_id: QuestionId,
    pub answer: Answer,
}

/// Server-side attempt record. `completed_at` is absent while in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptDto {
    pub id: AttemptId,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responses: Vec<ResponseDto>,
}

impl AttemptDto {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

//
// ─── CONTRACT ─────────────────────────────────────────────────────────────────
//

/// The remote calls the session manager consumes.
///
/// Implementations must map the backend's distinguishable failure conditions
/// to `ApiError::AlreadyCompleted` (for `submit_response` and
/// `complete_attempt`) and `ApiError::NotFound`/`NotImplemented` (for
/// `complete_attempt`), since the submission coordinator branches on them.
#[async_trait]
pub trait AttemptApi: Send + Sync {
    /// Create a new attempt for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the attempt cannot be created.
    async fn create_attempt(&self, quiz: QuizId) -> Result<AttemptId, ApiError>;

    /// Fetch the quiz definition to take an attempt against.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown quiz, or other errors.
    async fn get_quiz_for_attempt(&self, quiz: QuizId) -> Result<Quiz, ApiError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown attempt, or other errors.
    async fn get_attempt(&self, attempt: AttemptId) -> Result<AttemptDto, ApiError>;

    /// Persist one question's response on an attempt.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AlreadyCompleted` if the attempt was finished in
    /// the meantime, or other errors.
    async fn submit_response(
        &self,
        attempt: AttemptId,
        question: QuestionId,
        answer: &Answer,
    ) -> Result<(), ApiError>;

    /// Mark an attempt complete.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AlreadyCompleted` for the completion race,
    /// `ApiError::NotFound`/`NotImplemented` when the backend lacks the
    /// endpoint, or other errors.
    async fn complete_attempt(&self, attempt: AttemptId) -> Result<(), ApiError>;

    /// Create and complete an attempt in one call from locally buffered
    /// answers.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the submission is rejected; the local session
    /// stays intact for retry in that case.
    async fn submit_complete_quiz(
        &self,
        quiz: QuizId,
        started_at: DateTime<Utc>,
        answers: &HashMap<QuestionId, Answer>,
    ) -> Result<AttemptId, ApiError>;
}
