use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use quiz_core::model::{
    Answer, AttemptId, OptionId, Question, QuestionId, QuestionKind, QuestionOption, Quiz, QuizId,
    SESSION_TTL_HOURS, SessionRecord,
};
use quiz_core::time::{Clock, fixed_now};
use services::api::{ApiError, AttemptApi, AttemptDto};
use services::{SessionPhase, SessionWorkflow, SubmissionError, SubmitOutcome};
use storage::{MemoryBackend, SessionStore};

//
// ─── MOCK API ─────────────────────────────────────────────────────────────────
//

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum Script {
    #[default]
    Ok,
    AlreadyCompleted,
    NotImplemented,
    Fail,
}

impl Script {
    fn apply(self) -> Result<(), ApiError> {
        match self {
            Self::Ok => Ok(()),
            Self::AlreadyCompleted => Err(ApiError::AlreadyCompleted),
            Self::NotImplemented => Err(ApiError::NotImplemented),
            Self::Fail => Err(ApiError::Status {
                status: 500,
                message: "boom".into(),
            }),
        }
    }
}

#[derive(Default)]
struct MockState {
    completed: bool,
    response_script: Script,
    complete_script: Script,
    atomic_script: Script,
}

struct MockApi {
    quiz: Quiz,
    attempt_id: AttemptId,
    state: Mutex<MockState>,
    create_calls: AtomicUsize,
    response_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    atomic_calls: AtomicUsize,
}

impl MockApi {
    fn new(quiz: Quiz) -> Arc<Self> {
        Arc::new(Self {
            quiz,
            attempt_id: AttemptId::new(Uuid::new_v4()),
            state: Mutex::new(MockState::default()),
            create_calls: AtomicUsize::new(0),
            response_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            atomic_calls: AtomicUsize::new(0),
        })
    }

    fn script_responses(&self, script: Script) {
        self.state.lock().unwrap().response_script = script;
    }

    fn script_completion(&self, script: Script) {
        self.state.lock().unwrap().complete_script = script;
    }

    fn script_atomic(&self, script: Script) {
        self.state.lock().unwrap().atomic_script = script;
    }

    fn mark_completed(&self) {
        self.state.lock().unwrap().completed = true;
    }
}

#[async_trait]
impl AttemptApi for MockApi {
    async fn create_attempt(&self, _quiz: QuizId) -> Result<AttemptId, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.attempt_id)
    }

    async fn get_quiz_for_attempt(&self, _quiz: QuizId) -> Result<Quiz, ApiError> {
        Ok(self.quiz.clone())
    }

    async fn get_attempt(&self, attempt: AttemptId) -> Result<AttemptDto, ApiError> {
        let completed = self.state.lock().unwrap().completed;
        Ok(AttemptDto {
            id: attempt,
            completed_at: completed.then(fixed_now),
            responses: Vec::new(),
        })
    }

    async fn submit_response(
        &self,
        _attempt: AttemptId,
        _question: QuestionId,
        _answer: &Answer,
    ) -> Result<(), ApiError> {
        self.response_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().response_script.apply()
    }

    async fn complete_attempt(&self, _attempt: AttemptId) -> Result<(), ApiError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.state.lock().unwrap().complete_script;
        script.apply()?;
        self.state.lock().unwrap().completed = true;
        Ok(())
    }

    async fn submit_complete_quiz(
        &self,
        _quiz: QuizId,
        _started_at: DateTime<Utc>,
        _answers: &HashMap<QuestionId, Answer>,
    ) -> Result<AttemptId, ApiError> {
        self.atomic_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().atomic_script.apply()?;
        Ok(self.attempt_id)
    }
}

//
// ─── FIXTURES ─────────────────────────────────────────────────────────────────
//

fn build_question(id: u64, prompt: &str, position: u32) -> Question {
    Question {
        id: QuestionId::new(id),
        kind: QuestionKind::MultipleChoice,
        prompt: prompt.into(),
        options: vec![
            QuestionOption {
                id: OptionId::new(1),
                text: "A".into(),
            },
            QuestionOption {
                id: OptionId::new(2),
                text: "B".into(),
            },
        ],
        position,
    }
}

fn build_quiz() -> Quiz {
    Quiz::new(
        QuizId::new(1),
        "Basics",
        vec![
            build_question(1, "What is 2+2?", 0),
            build_question(2, "What is 3+3?", 1),
            build_question(3, "What is 4+4?", 2),
        ],
    )
    .unwrap()
}

struct Harness {
    workflow: SessionWorkflow<MemoryBackend>,
    api: Arc<MockApi>,
    // A second store handle over the same backend, for assertions.
    inspect: SessionStore<MemoryBackend>,
}

fn harness_at(api: Arc<MockApi>, now: DateTime<Utc>) -> Harness {
    let backend = MemoryBackend::new();
    let clock = Clock::fixed(now);
    Harness {
        workflow: SessionWorkflow::new(clock, SessionStore::new(backend.clone(), clock), api.clone()),
        api,
        inspect: SessionStore::new(backend, clock),
    }
}

fn harness(api: Arc<MockApi>) -> Harness {
    harness_at(api, fixed_now())
}

//
// ─── LIFECYCLE ────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn reload_mid_quiz_restores_index_and_answers() {
    let h = harness(MockApi::new(build_quiz()));

    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Fresh);
    h.workflow.navigate_to(&mut session, 1).unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(1), Answer::choice(OptionId::new(2)))
        .unwrap();
    drop(session);

    let restored = h.workflow.start(QuizId::new(1), false).await.unwrap();
    assert_eq!(restored.phase(), SessionPhase::Resumed);
    assert_eq!(restored.current_index(), 1);
    assert_eq!(
        restored.answers().get(&QuestionId::new(1)),
        Some(&Answer::choice(OptionId::new(2)))
    );
}

#[tokio::test]
async fn force_new_discards_existing_session() {
    let h = harness(MockApi::new(build_quiz()));

    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(1), Answer::choice(OptionId::new(1)))
        .unwrap();

    let fresh = h.workflow.start(QuizId::new(1), true).await.unwrap();
    assert_eq!(fresh.phase(), SessionPhase::Fresh);
    assert_eq!(fresh.current_index(), 0);
    assert!(fresh.answers().is_empty());
}

#[tokio::test]
async fn expired_record_is_never_resumed() {
    let api = MockApi::new(build_quiz());
    let started = fixed_now();

    // Write a record through a store pinned at the old time, then
    // initialize past the staleness threshold.
    let backend = MemoryBackend::new();
    let old_store = SessionStore::new(backend.clone(), Clock::fixed(started));
    let mut record = SessionRecord::fresh(started);
    record.current_index = 2;
    old_store.save(QuizId::new(1), &mut record).unwrap();

    let later = started + Duration::hours(SESSION_TTL_HOURS) + Duration::minutes(1);
    let clock = Clock::fixed(later);
    let workflow = SessionWorkflow::new(clock, SessionStore::new(backend, clock), api);
    let session = workflow.start(QuizId::new(1), false).await.unwrap();

    assert_eq!(session.phase(), SessionPhase::Fresh);
    assert_eq!(session.current_index(), 0);
}

#[tokio::test]
async fn content_change_discards_session_and_stores_new_fingerprint() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(1), Answer::choice(OptionId::new(1)))
        .unwrap();
    h.workflow.navigate_to(&mut session, 2).unwrap();

    // Server edits a prompt: same ids, different content.
    let edited = Quiz::new(
        QuizId::new(1),
        "Basics",
        vec![
            build_question(1, "What is 2+2? (pick one)", 0),
            build_question(2, "What is 3+3?", 1),
            build_question(3, "What is 4+4?", 2),
        ],
    )
    .unwrap();
    let expected = quiz_core::fingerprint::fingerprint(edited.questions());

    let fresh = h.workflow.initialize(edited, false).unwrap();
    assert_eq!(fresh.phase(), SessionPhase::Fresh);
    assert_eq!(fresh.current_index(), 0);
    assert!(fresh.answers().is_empty());
    assert_eq!(fresh.fingerprint(), expected);

    let record = h.inspect.load(QuizId::new(1)).unwrap();
    assert_eq!(record.fingerprint.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn completed_marker_forces_fresh_session_and_drops_old_attempt() {
    let h = harness(MockApi::new(build_quiz()));
    let stale_attempt = AttemptId::new(Uuid::new_v4());
    h.inspect.set_attempt(QuizId::new(1), stale_attempt);
    h.inspect.mark_completed(QuizId::new(1));

    let session = h.workflow.start(QuizId::new(1), false).await.unwrap();

    assert_eq!(session.phase(), SessionPhase::Fresh);
    assert!(session.attempt_id().is_none());
    assert!(h.inspect.attempt(QuizId::new(1)).is_none());
    assert!(!h.inspect.is_completed(QuizId::new(1)));
}

#[tokio::test]
async fn reset_produces_a_fresh_persisted_session() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(2), Answer::code("let x = 1;"))
        .unwrap();

    h.workflow.reset(&mut session).unwrap();

    assert_eq!(session.phase(), SessionPhase::Fresh);
    assert!(session.answers().is_empty());
    let record = h.inspect.load(QuizId::new(1)).unwrap();
    assert!(record.answers.is_empty());
}

#[tokio::test]
async fn ensure_attempt_creates_remotely_once() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();

    let first = h.workflow.ensure_attempt(&mut session).await.unwrap();
    let second = h.workflow.ensure_attempt(&mut session).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.api.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.inspect.attempt(QuizId::new(1)), Some(first));
}

//
// ─── INCREMENTAL SUBMISSION ───────────────────────────────────────────────────
//

async fn answered_session_with_attempt(h: &Harness) -> services::AttemptSession {
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    h.workflow.ensure_attempt(&mut session).await.unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(1), Answer::choice(OptionId::new(1)))
        .unwrap();
    h.workflow
        .save_answer(&mut session, QuestionId::new(2), Answer::choice(OptionId::new(2)))
        .unwrap();
    session
}

#[tokio::test]
async fn unanswered_submission_requires_confirmation_then_completes_once() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;

    // Two of three answered: first call surfaces the prompt data.
    let outcome = h.workflow.submit(&mut session, false).await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::ConfirmationRequired {
            unanswered: 1,
            none_answered: false,
        }
    );

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert_eq!(report.attempt_id, h.api.attempt_id);
    assert!(!report.already_completed);
    assert!(report.failed_responses.is_empty());
    assert_eq!(h.api.response_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.phase(), SessionPhase::Completed);
}

#[tokio::test]
async fn double_submit_issues_exactly_one_completion() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;

    let first = h.workflow.submit(&mut session, true).await.unwrap();
    assert!(matches!(first, SubmitOutcome::Submitted(_)));

    // Second call short-circuits on the remote completed_at pre-check.
    let second = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = second else {
        panic!("expected a submitted outcome, got {second:?}");
    };
    assert!(report.already_completed);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completion_race_is_treated_as_success() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.script_completion(Script::AlreadyCompleted);

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert!(report.already_completed);
    assert!(!report.fallback);
    // No retry of the completion call.
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn all_responses_losing_the_race_skips_the_completion_call() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.script_responses(Script::AlreadyCompleted);

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert!(report.already_completed);
    assert_eq!(h.api.response_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_completion_endpoint_is_a_flagged_fallback_success() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.script_completion(Script::NotImplemented);

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert!(!report.already_completed);
    assert!(report.fallback);
    assert_eq!(session.phase(), SessionPhase::Completed);
}

#[tokio::test]
async fn failed_single_responses_do_not_abort_the_submission() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.script_responses(Script::Fail);

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    // Both responses failed for a non-race reason; completion still ran.
    assert_eq!(report.failed_responses.len(), 2);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn genuine_completion_failure_keeps_the_session_for_retry() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.script_completion(Script::Fail);

    let err = h.workflow.submit(&mut session, true).await.unwrap_err();
    // The attempt id still comes back so the caller can navigate to results.
    assert_eq!(err.attempt_id(), Some(h.api.attempt_id));
    assert!(matches!(err, SubmissionError::Completion { .. }));

    assert_eq!(session.phase(), SessionPhase::InProgress);
    assert!(!session.is_submitting());
    assert!(h.inspect.load(QuizId::new(1)).is_some());
    assert!(!h.inspect.is_completed(QuizId::new(1)));
}

//
// ─── ATOMIC SUBMISSION ────────────────────────────────────────────────────────
//

#[tokio::test]
async fn atomic_submission_completes_and_clears_the_record() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    for id in 1..=3 {
        h.workflow
            .save_answer(&mut session, QuestionId::new(id), Answer::choice(OptionId::new(1)))
            .unwrap();
    }

    let outcome = h.workflow.submit(&mut session, false).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert_eq!(report.attempt_id, h.api.attempt_id);
    assert_eq!(h.api.atomic_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.api.response_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 0);

    // The record blob is gone; attempt pointer and completion marker stay.
    assert!(h.inspect.load(QuizId::new(1)).is_none());
    assert_eq!(h.inspect.attempt(QuizId::new(1)), Some(h.api.attempt_id));
    assert!(h.inspect.is_completed(QuizId::new(1)));
}

#[tokio::test]
async fn atomic_failure_leaves_the_session_intact() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = h.workflow.start(QuizId::new(1), false).await.unwrap();
    for id in 1..=3 {
        h.workflow
            .save_answer(&mut session, QuestionId::new(id), Answer::choice(OptionId::new(1)))
            .unwrap();
    }
    h.api.script_atomic(Script::Fail);

    let err = h.workflow.submit(&mut session, false).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Atomic { .. }));
    assert!(err.attempt_id().is_none());

    assert_eq!(session.phase(), SessionPhase::InProgress);
    let record = h.inspect.load(QuizId::new(1)).unwrap();
    assert_eq!(record.answers.len(), 3);
}

#[tokio::test]
async fn already_completed_pre_check_skips_all_writes() {
    let h = harness(MockApi::new(build_quiz()));
    let mut session = answered_session_with_attempt(&h).await;
    h.api.mark_completed();

    let outcome = h.workflow.submit(&mut session, true).await.unwrap();
    let SubmitOutcome::Submitted(report) = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert!(report.already_completed);
    assert_eq!(h.api.response_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.api.complete_calls.load(Ordering::SeqCst), 0);
}
