#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use api::{ApiConfig, ApiError, AttemptApi, AttemptDto, HttpAttemptApi, ResponseDto};
pub use error::{SessionError, SubmissionError};
pub use sessions::{
    AttemptSession, SessionPhase, SessionProgress, SessionWorkflow, SubmissionReport,
    SubmitOutcome,
};
