use std::sync::Arc;

use chrono::{DateTime, Utc};

use quiz_core::Clock;
use quiz_core::fingerprint;
use quiz_core::model::{Answer, AttemptId, QuestionId, Quiz, QuizId};
use storage::{SessionBackend, SessionStore, StoreError};

use crate::api::AttemptApi;
use crate::error::SessionError;

use super::service::AttemptSession;

/// Orchestrates the attempt lifecycle: session creation/resumption against
/// the durable store, answer buffering, and the submission drain to the
/// remote API.
///
/// Storage and API are injected, never reached through ambient state. Every
/// mutating operation persists the session record before returning, so a
/// page reload at any point recovers the latest in-memory state.
pub struct SessionWorkflow<B> {
    clock: Clock,
    store: SessionStore<B>,
    api: Arc<dyn AttemptApi>,
}

impl<B: SessionBackend> SessionWorkflow<B> {
    #[must_use]
    pub fn new(clock: Clock, store: SessionStore<B>, api: Arc<dyn AttemptApi>) -> Self {
        Self { clock, store, api }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub(crate) fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    pub(crate) fn api(&self) -> &Arc<dyn AttemptApi> {
        &self.api
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fetch the quiz definition and initialize a session for it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` if the quiz cannot be fetched, otherwise
    /// whatever `initialize` returns.
    pub async fn start(
        &self,
        quiz_id: QuizId,
        force_new: bool,
    ) -> Result<AttemptSession, SessionError> {
        let quiz = self.api.get_quiz_for_attempt(quiz_id).await?;
        self.initialize(quiz, force_new)
    }

    /// Initialize a session for an already-fetched quiz definition.
    ///
    /// Resumes a valid persisted record; starts fresh when forced, when the
    /// previous run completed, when the record expired, or when the quiz
    /// content changed since the record was written.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyQuiz` for a quiz served without
    /// questions, or `SessionError::Store` if persisting fails.
    pub fn initialize(&self, quiz: Quiz, force_new: bool) -> Result<AttemptSession, SessionError> {
        if quiz.question_count() == 0 {
            return Err(SessionError::EmptyQuiz);
        }
        let quiz_id = quiz.id();
        let now = self.now();

        // A completion marker means the previous run finished: whatever else
        // is stored refers to a dead attempt and must not be resumed.
        if self.store.is_completed(quiz_id) {
            log::debug!("quiz {quiz_id} was completed earlier, starting a fresh session");
            self.store.clear(quiz_id);
            return self.start_fresh(quiz, now);
        }

        if force_new {
            self.store.clear(quiz_id);
            return self.start_fresh(quiz, now);
        }

        let Some(record) = self.store.load(quiz_id) else {
            return self.start_fresh(quiz, now);
        };

        if record.is_expired(now) {
            log::debug!("session record for quiz {quiz_id} expired, starting fresh");
            self.store.clear(quiz_id);
            return self.start_fresh(quiz, now);
        }

        if fingerprint::has_changed(&record, quiz.questions()) {
            log::debug!("quiz {quiz_id} content changed, discarding stale session");
            self.store.clear(quiz_id);
            return self.start_fresh(quiz, now);
        }

        let mut session = AttemptSession::resumed(quiz, record, now);
        // The attempt pointer key can outlive the blob's own copy.
        if session.attempt_id().is_none()
            && let Some(attempt) = self.store.attempt(quiz_id)
        {
            session.set_attempt_id(attempt);
        }
        self.persist(&session)?;
        Ok(session)
    }

    fn start_fresh(&self, quiz: Quiz, now: DateTime<Utc>) -> Result<AttemptSession, SessionError> {
        let session = AttemptSession::fresh(quiz, now);
        self.persist(&session)?;
        Ok(session)
    }

    /// Discard the session entirely and start over, both for "user wants to
    /// retake" and for "server content changed".
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the fresh record cannot be persisted.
    pub fn reset(&self, session: &mut AttemptSession) -> Result<(), SessionError> {
        self.store.clear(session.quiz_id());
        *session = AttemptSession::fresh(session.quiz().clone(), self.now());
        self.persist(session)?;
        Ok(())
    }

    /// Move to an absolute question index and persist. Out-of-range indices
    /// are silently ignored; returns whether the index changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if persisting fails.
    pub fn navigate_to(
        &self,
        session: &mut AttemptSession,
        index: usize,
    ) -> Result<bool, SessionError> {
        session.begin();
        let changed = session.navigate_to(index);
        if changed {
            self.persist(session)?;
        }
        Ok(changed)
    }

    /// Move by a signed offset with the same semantics as [`Self::navigate_to`].
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if persisting fails.
    pub fn navigate_by(
        &self,
        session: &mut AttemptSession,
        delta: isize,
    ) -> Result<bool, SessionError> {
        session.begin();
        let changed = session.navigate_by(delta);
        if changed {
            self.persist(session)?;
        }
        Ok(changed)
    }

    /// Buffer the user's answer locally and persist immediately. Never
    /// touches the network, so answering keeps working offline.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if persisting fails.
    pub fn save_answer(
        &self,
        session: &mut AttemptSession,
        question: QuestionId,
        answer: Answer,
    ) -> Result<bool, SessionError> {
        session.begin();
        let changed = session.record_answer(question, answer);
        if changed {
            self.persist(session)?;
        }
        Ok(changed)
    }

    /// Create the remote attempt if the session does not reference one yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` if the backend rejects the creation.
    pub async fn ensure_attempt(
        &self,
        session: &mut AttemptSession,
    ) -> Result<AttemptId, SessionError> {
        if let Some(attempt) = session.attempt_id() {
            return Ok(attempt);
        }
        let attempt = self.api.create_attempt(session.quiz_id()).await?;
        session.set_attempt_id(attempt);
        self.store.set_attempt(session.quiz_id(), attempt);
        self.persist(session)?;
        Ok(attempt)
    }

    pub(crate) fn persist(&self, session: &AttemptSession) -> Result<(), StoreError> {
        let mut record = session.to_record();
        self.store.save(session.quiz_id(), &mut record)
    }
}
