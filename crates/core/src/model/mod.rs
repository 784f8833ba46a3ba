mod answer;
mod ids;
mod question;
mod record;

pub use answer::Answer;
pub use ids::{AttemptId, OptionId, QuestionId, QuizId};
pub use question::{Question, QuestionKind, QuestionOption, Quiz, QuizDefinitionError};
pub use record::{SESSION_TTL_HOURS, SessionRecord};
