use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(QuestionId),
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// The two question styles the platform serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick one option from a fixed list.
    MultipleChoice,
    /// Free-form code typed into an editor.
    Code,
}

impl QuestionKind {
    /// Stable label used in the content fingerprint and wire payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::Code => "code",
        }
    }
}

/// One selectable option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
}

/// One question of a quiz, as served by the backend.
///
/// `position` is the server-assigned display order; reorderings change the
/// quiz's content fingerprint even when the question set is otherwise equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    pub position: u32,
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// A quiz definition: server-owned, immutable from the client's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    title: String,
    questions: Vec<Question>,
}

impl Quiz {
    /// Build a quiz definition, validating that questions exist and that ids
    /// are unique.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError::NoQuestions` for an empty question list
    /// and `QuizDefinitionError::DuplicateQuestionId` when two questions
    /// share an id.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizDefinitionError> {
        if questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        for (i, question) in questions.iter().enumerate() {
            if questions[..i].iter().any(|q| q.id == question.id) {
                return Err(QuizDefinitionError::DuplicateQuestionId(question.id));
            }
        }

        Ok(Self {
            id,
            title: title.into(),
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions in this quiz.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// True if `id` belongs to one of this quiz's questions.
    #[must_use]
    pub fn contains_question(&self, id: QuestionId) -> bool {
        self.questions.iter().any(|q| q.id == id)
    }
}
