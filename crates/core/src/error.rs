use thiserror::Error;

use crate::model::QuizDefinitionError;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error(transparent)]
    Definition(#[from] QuizDefinitionError),
}
