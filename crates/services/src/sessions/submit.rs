//! Submission coordinator: drains locally buffered answers to the backend
//! and finalizes the attempt, tolerating partial failures.
//!
//! Two modes. Incremental (the attempt already exists remotely) submits each
//! buffered answer individually and then completes the attempt; atomic (no
//! attempt yet) creates and completes the attempt in one call. Both share
//! the session's single in-flight guard.

use futures::future;

use quiz_core::model::{Answer, AttemptId, QuestionId};
use storage::SessionBackend;

use crate::error::SubmissionError;

use super::service::AttemptSession;
use super::workflow::SessionWorkflow;

/// What a submission produced, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub attempt_id: AttemptId,
    /// The attempt was already completed elsewhere; treated as success.
    pub already_completed: bool,
    /// The backend lacks a completion endpoint; treated as success so the
    /// user is not blocked, but flagged so callers can distinguish it.
    pub fallback: bool,
    /// Individual responses that failed for reasons other than the
    /// completion race. Logged, not fatal.
    pub failed_responses: Vec<(QuestionId, String)>,
}

impl SubmissionReport {
    fn completed(attempt_id: AttemptId) -> Self {
        Self {
            attempt_id,
            already_completed: false,
            fallback: false,
            failed_responses: Vec::new(),
        }
    }

    fn already_completed(attempt_id: AttemptId) -> Self {
        Self {
            already_completed: true,
            ..Self::completed(attempt_id)
        }
    }
}

/// Outcome of a call to [`SessionWorkflow::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Unanswered questions remain and the caller has not confirmed.
    /// `none_answered` distinguishes "submit with gaps" from "submit with
    /// nothing at all", which warrant different prompt wording.
    ConfirmationRequired {
        unanswered: usize,
        none_answered: bool,
    },
    /// A submission is already in flight; nothing new was started.
    InFlight { attempt_id: Option<AttemptId> },
    /// The submission ran to an accepted end state.
    Submitted(SubmissionReport),
}

impl<B: SessionBackend> SessionWorkflow<B> {
    /// Submit the session's buffered answers and finalize the attempt.
    ///
    /// Re-entry while a submission is outstanding returns
    /// [`SubmitOutcome::InFlight`] without issuing any network call. When
    /// unanswered questions remain and `confirmed` is false, returns
    /// [`SubmitOutcome::ConfirmationRequired`] without side effects; the
    /// caller re-invokes with `confirmed = true` after prompting.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` for genuine failures only: expected races
    /// and backend gaps come back as successful [`SubmissionReport`]s. On
    /// error the durable session is left intact for retry.
    pub async fn submit(
        &self,
        session: &mut AttemptSession,
        confirmed: bool,
    ) -> Result<SubmitOutcome, SubmissionError> {
        if session.is_submitting() {
            return Ok(SubmitOutcome::InFlight {
                attempt_id: session.attempt_id(),
            });
        }

        let unanswered = session.unanswered_count();
        if unanswered > 0 && !confirmed {
            return Ok(SubmitOutcome::ConfirmationRequired {
                unanswered,
                none_answered: session.answered_count() == 0,
            });
        }

        session.begin_submit();
        let result = match session.attempt_id() {
            Some(attempt) => self.submit_incremental(session, attempt).await,
            None => self.submit_atomic(session).await,
        };

        match result {
            Ok(report) => {
                self.finish(session, &report);
                Ok(SubmitOutcome::Submitted(report))
            }
            Err(err) => {
                session.abort_submit();
                Err(err)
            }
        }
    }

    /// Incremental mode: per-answer response submissions, then one
    /// completion call.
    async fn submit_incremental(
        &self,
        session: &AttemptSession,
        attempt: AttemptId,
    ) -> Result<SubmissionReport, SubmissionError> {
        // Short-circuit if the attempt finished elsewhere; skip all writes.
        match self.api().get_attempt(attempt).await {
            Ok(dto) if dto.is_completed() => {
                log::debug!("attempt {attempt} already completed, skipping submission");
                return Ok(SubmissionReport::already_completed(attempt));
            }
            Ok(_) => {}
            Err(err) => {
                // The pre-check is an optimization; the completion call
                // handles the race authoritatively.
                log::debug!("attempt pre-check failed, proceeding: {err}");
            }
        }

        let answers: Vec<(QuestionId, Answer)> = session
            .answers()
            .iter()
            .map(|(q, a)| (*q, a.clone()))
            .collect();

        // Issue all response submissions, then await them jointly. One
        // failing must not abort the others.
        let settled = future::join_all(answers.iter().map(|(question, answer)| {
            let api = self.api().clone();
            async move { (*question, api.submit_response(attempt, *question, answer).await) }
        }))
        .await;

        let total = settled.len();
        let mut race_losses = 0_usize;
        let mut failed_responses = Vec::new();
        for (question, result) in settled {
            match result {
                Ok(()) => {}
                Err(err) if err.is_already_completed() => race_losses += 1,
                Err(err) => {
                    log::warn!("response for question {question} failed: {err}");
                    failed_responses.push((question, err.to_string()));
                }
            }
        }

        // Every single response lost the race: the attempt is complete, do
        // not hit the completion endpoint again.
        if total > 0 && race_losses == total {
            return Ok(SubmissionReport::already_completed(attempt));
        }

        match self.api().complete_attempt(attempt).await {
            Ok(()) => Ok(SubmissionReport {
                failed_responses,
                ..SubmissionReport::completed(attempt)
            }),
            Err(err) if err.is_already_completed() => Ok(SubmissionReport {
                failed_responses,
                ..SubmissionReport::already_completed(attempt)
            }),
            Err(err) if err.is_backend_gap() => {
                log::warn!("completion endpoint unavailable for attempt {attempt}: {err}");
                Ok(SubmissionReport {
                    fallback: true,
                    failed_responses,
                    ..SubmissionReport::completed(attempt)
                })
            }
            Err(source) => Err(SubmissionError::Completion {
                attempt_id: attempt,
                source,
            }),
        }
    }

    /// Atomic mode: create and complete the attempt in one call.
    async fn submit_atomic(
        &self,
        session: &AttemptSession,
    ) -> Result<SubmissionReport, SubmissionError> {
        let attempt = self
            .api()
            .submit_complete_quiz(session.quiz_id(), session.started_at(), session.answers())
            .await
            .map_err(|source| SubmissionError::Atomic { source })?;
        Ok(SubmissionReport::completed(attempt))
    }

    /// Shared success epilogue: freeze the session, persist the attempt id
    /// and completion marker, drop the record blob. The marker outlives the
    /// blob so the next initialize starts fresh.
    fn finish(&self, session: &mut AttemptSession, report: &SubmissionReport) {
        let quiz_id = session.quiz_id();
        session.complete(report.attempt_id, self.now());
        self.store().set_attempt(quiz_id, report.attempt_id);
        self.store().mark_completed(quiz_id);
        self.store().remove_record(quiz_id);
    }
}
