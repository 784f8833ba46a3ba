use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::answer::Answer;
use crate::model::ids::{AttemptId, QuestionId};

/// How long a persisted session stays resumable. Anything older is discarded
/// on the next initialize rather than resumed.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Client-local snapshot of in-progress quiz-taking state.
///
/// One record exists per quiz id. It is the unit the session store
/// serializes, and it must survive a JSON round trip unchanged (modulo
/// `last_updated`, which the store refreshes on every save).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub current_index: usize,
    pub answers: HashMap<QuestionId, Answer>,
    pub attempt_id: Option<AttemptId>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    pub fingerprint: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl SessionRecord {
    /// A brand-new record: first question, no answers, clock started now.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            current_index: 0,
            answers: HashMap::new(),
            attempt_id: None,
            started_at: now,
            elapsed_seconds: 0,
            fingerprint: None,
            last_updated: now,
        }
    }

    /// True if the record is too old to resume.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_updated > Duration::hours(SESSION_TTL_HOURS)
    }

    /// Elapsed seconds at resume time: the stored accumulation plus the
    /// wall-clock delta since the session started. Clock skew can make the
    /// delta negative; the result is clamped so elapsed time never runs
    /// backwards.
    #[must_use]
    pub fn resumed_elapsed(&self, now: DateTime<Utc>) -> i64 {
        let delta = (now - self.started_at).num_seconds().max(0);
        self.elapsed_seconds.saturating_add(delta)
    }

    /// Record an answer for a question, last write wins.
    pub fn record_answer(&mut self, question: QuestionId, answer: Answer) {
        self.answers.insert(question, answer);
    }

    /// Number of questions with a recorded answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }
}
