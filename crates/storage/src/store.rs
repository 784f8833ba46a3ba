use thiserror::Error;

use quiz_core::Clock;
use quiz_core::model::{AttemptId, QuizId, SessionRecord};

/// Errors surfaced by the session store.
///
/// Deliberately small: corrupt persisted data is recovered internally (the
/// entry is dropped and `load` reports absence), never surfaced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The tab-scoped key-value medium the session store writes through.
///
/// All operations are synchronous; implementations must not perform network
/// I/O. `MemoryBackend` is the in-process implementation; a platform
/// adapter (e.g. one backed by a browser's sessionStorage) plugs in here.
pub trait SessionBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// Durable session store: one `SessionRecord` blob per quiz id, plus two
/// auxiliary keys (attempt-id pointer, completion marker).
pub struct SessionStore<B> {
    backend: B,
    clock: Clock,
}

fn session_key(quiz: QuizId) -> String {
    format!("quiz_session_{quiz}")
}

fn attempt_key(quiz: QuizId) -> String {
    format!("quiz_attempt_{quiz}")
}

fn completed_key(quiz: QuizId) -> String {
    format!("quiz_completed_{quiz}")
}

impl<B: SessionBackend> SessionStore<B> {
    #[must_use]
    pub fn new(backend: B, clock: Clock) -> Self {
        Self { backend, clock }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the session record for a quiz.
    ///
    /// A blob that fails to parse is treated as absent: the corrupt entry is
    /// removed and `None` returned. Callers never see a parse error.
    #[must_use]
    pub fn load(&self, quiz: QuizId) -> Option<SessionRecord> {
        let key = session_key(quiz);
        let raw = self.backend.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("discarding corrupt session record for quiz {quiz}: {err}");
                self.backend.remove(&key);
                None
            }
        }
    }

    /// Persist the session record for a quiz, stamping `last_updated`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the record cannot be encoded.
    pub fn save(&self, quiz: QuizId, record: &mut SessionRecord) -> Result<(), StoreError> {
        record.last_updated = self.clock.now();
        let raw = serde_json::to_string(record)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.backend.set(&session_key(quiz), &raw);
        Ok(())
    }

    /// Remove the record blob alone, leaving the auxiliary keys in place.
    ///
    /// Used after a successful final submission: the completion marker must
    /// survive so the next initialize starts a fresh session instead of
    /// resuming a finished one.
    pub fn remove_record(&self, quiz: QuizId) {
        self.backend.remove(&session_key(quiz));
    }

    /// Remove every key belonging to this quiz so no residue of a discarded
    /// session remains, auxiliary keys included.
    pub fn clear(&self, quiz: QuizId) {
        // Suffix match on "_{id}": a plain substring match would let quiz 1
        // clear quiz 12's keys.
        let suffix = format!("_{quiz}");
        for key in self.backend.keys() {
            if key.ends_with(&suffix) {
                self.backend.remove(&key);
            }
        }
    }

    /// Stored attempt-id pointer for a quiz, if any.
    #[must_use]
    pub fn attempt(&self, quiz: QuizId) -> Option<AttemptId> {
        let raw = self.backend.get(&attempt_key(quiz))?;
        match raw.parse() {
            Ok(uuid) => Some(AttemptId::new(uuid)),
            Err(_) => {
                log::warn!("discarding corrupt attempt pointer for quiz {quiz}");
                self.backend.remove(&attempt_key(quiz));
                None
            }
        }
    }

    pub fn set_attempt(&self, quiz: QuizId, attempt: AttemptId) {
        self.backend
            .set(&attempt_key(quiz), &attempt.value().to_string());
    }

    pub fn remove_attempt(&self, quiz: QuizId) {
        self.backend.remove(&attempt_key(quiz));
    }

    /// Mark this quiz as completed in this tab. Survives until `clear`.
    pub fn mark_completed(&self, quiz: QuizId) {
        self.backend.set(&completed_key(quiz), "true");
    }

    #[must_use]
    pub fn is_completed(&self, quiz: QuizId) -> bool {
        self.backend.get(&completed_key(quiz)).is_some()
    }
}
