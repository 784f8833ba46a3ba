use serde::{Deserialize, Serialize};

use crate::model::ids::OptionId;

/// The payload a user records for one question.
///
/// The shape depends on the question kind: a selected option for
/// multiple-choice, the submitted source text for code questions. Stored as
/// an internally tagged enum so the session blob stays self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(OptionId),
    Code(String),
}

impl Answer {
    #[must_use]
    pub fn choice(option: OptionId) -> Self {
        Self::Choice(option)
    }

    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Self::Code(source.into())
    }

    /// Selected option id, if this is a multiple-choice answer.
    #[must_use]
    pub fn selected_option(&self) -> Option<OptionId> {
        match self {
            Self::Choice(id) => Some(*id),
            Self::Code(_) => None,
        }
    }

    /// Submitted code text, if this is a code answer.
    #[must_use]
    pub fn code_text(&self) -> Option<&str> {
        match self {
            Self::Choice(_) => None,
            Self::Code(text) => Some(text),
        }
    }
}
