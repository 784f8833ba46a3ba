use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use quiz_core::fingerprint;
use quiz_core::model::{Answer, AttemptId, Question, QuestionId, Quiz, QuizId, SessionRecord};

use super::progress::SessionProgress;

//
// ─── PHASE ────────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of an attempt session.
///
/// `Fresh` and `Resumed` only say how the session came to exist; both
/// collapse into `InProgress` via [`AttemptSession::begin`] once the first
/// render has happened. "Uninitialized" is simply the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Fresh,
    Resumed,
    InProgress,
    Submitting,
    Completed,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// In-memory state of one user's run through a quiz.
///
/// Pure state transitions only: no storage, no network. The
/// `SessionWorkflow` wraps every mutation here with a synchronous persist so
/// a reload recovers the latest state.
pub struct AttemptSession {
    quiz: Quiz,
    current_index: usize,
    answers: HashMap<QuestionId, Answer>,
    attempt_id: Option<AttemptId>,
    started_at: DateTime<Utc>,
    /// Accumulated seconds as of `observed_at`; live elapsed time is this
    /// plus the wall clock since then.
    elapsed_seconds: i64,
    observed_at: DateTime<Utc>,
    fingerprint: String,
    phase: SessionPhase,
    submitting: bool,
}

impl AttemptSession {
    /// A brand-new session: first question, no answers, fingerprint taken
    /// from the live question set.
    #[must_use]
    pub fn fresh(quiz: Quiz, now: DateTime<Utc>) -> Self {
        let fingerprint = fingerprint::fingerprint(quiz.questions());
        Self {
            quiz,
            current_index: 0,
            answers: HashMap::new(),
            attempt_id: None,
            started_at: now,
            elapsed_seconds: 0,
            observed_at: now,
            fingerprint,
            phase: SessionPhase::Fresh,
            submitting: false,
        }
    }

    /// Restore a session from a persisted record, reconciling elapsed time
    /// with the wall clock.
    ///
    /// A record without a stored fingerprint gets the freshly computed one
    /// (first observation, not a content change). The restored index is
    /// clamped in case the question count shrank under an unchanged
    /// fingerprint, which cannot normally happen but must not panic.
    #[must_use]
    pub fn resumed(quiz: Quiz, record: SessionRecord, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = record.resumed_elapsed(now);
        let fingerprint = record
            .fingerprint
            .unwrap_or_else(|| fingerprint::fingerprint(quiz.questions()));
        let current_index = record
            .current_index
            .min(quiz.question_count().saturating_sub(1));
        Self {
            current_index,
            answers: record.answers,
            attempt_id: record.attempt_id,
            started_at: record.started_at,
            elapsed_seconds,
            observed_at: now,
            fingerprint,
            quiz,
            phase: SessionPhase::Resumed,
            submitting: false,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz.id()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question(self.current_index)
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    /// Elapsed seconds at `now`: the reconciled base plus time in this run.
    /// Frozen once the session completes.
    #[must_use]
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> i64 {
        if self.is_completed() {
            return self.elapsed_seconds;
        }
        let delta = (now - self.observed_at).num_seconds().max(0);
        self.elapsed_seconds.saturating_add(delta)
    }

    /// Number of questions with a recorded answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Number of questions still unanswered.
    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.quiz.question_count().saturating_sub(self.answers.len())
    }

    /// Aggregated progress from local state only; never consults the server.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.quiz.question_count(),
            answered: self.answered_count(),
            remaining: self.unanswered_count(),
            is_complete: self.is_completed(),
        }
    }

    /// Collapse `Fresh`/`Resumed` into `InProgress` after the first render.
    pub fn begin(&mut self) {
        if matches!(self.phase, SessionPhase::Fresh | SessionPhase::Resumed) {
            self.phase = SessionPhase::InProgress;
        }
    }

    /// Move to an absolute question index. Out-of-range requests are
    /// silently ignored; returns whether the index changed.
    pub fn navigate_to(&mut self, index: usize) -> bool {
        if index >= self.quiz.question_count() || index == self.current_index {
            return false;
        }
        self.current_index = index;
        true
    }

    /// Move by a signed offset with the same clamp-and-ignore semantics.
    pub fn navigate_by(&mut self, delta: isize) -> bool {
        let Some(target) = self.current_index.checked_add_signed(delta) else {
            return false;
        };
        self.navigate_to(target)
    }

    /// Record the user's answer for a question, last write wins. Ids not
    /// belonging to this quiz are ignored; returns whether anything changed.
    pub fn record_answer(&mut self, question: QuestionId, answer: Answer) -> bool {
        if !self.quiz.contains_question(question) {
            log::debug!("ignoring answer for unknown question {question}");
            return false;
        }
        if self.answers.get(&question) == Some(&answer) {
            return false;
        }
        self.answers.insert(question, answer);
        true
    }

    pub(crate) fn set_attempt_id(&mut self, attempt: AttemptId) {
        self.attempt_id = Some(attempt);
    }

    pub(crate) fn begin_submit(&mut self) {
        self.submitting = true;
        self.phase = SessionPhase::Submitting;
    }

    pub(crate) fn abort_submit(&mut self) {
        self.submitting = false;
        self.phase = SessionPhase::InProgress;
    }

    /// Finish the session: freeze elapsed time, record the attempt id, stop
    /// the submitting state.
    pub(crate) fn complete(&mut self, attempt: AttemptId, now: DateTime<Utc>) {
        self.elapsed_seconds = self.elapsed_at(now);
        self.observed_at = now;
        self.attempt_id = Some(attempt);
        self.submitting = false;
        self.phase = SessionPhase::Completed;
    }

    /// Snapshot for the durable store. `last_updated` is stamped on save.
    #[must_use]
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            current_index: self.current_index,
            answers: self.answers.clone(),
            attempt_id: self.attempt_id,
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds,
            fingerprint: Some(self.fingerprint.clone()),
            last_updated: self.started_at,
        }
    }
}

impl fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptSession")
            .field("quiz_id", &self.quiz.id())
            .field("current_index", &self.current_index)
            .field("answers_len", &self.answers.len())
            .field("attempt_id", &self.attempt_id)
            .field("phase", &self.phase)
            .field("submitting", &self.submitting)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ────────────────────────────────────────────────────────────────────
//
