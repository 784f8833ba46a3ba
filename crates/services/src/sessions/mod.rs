mod progress;
mod service;
mod submit;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SubmissionError};
pub use progress::SessionProgress;
pub use service::{AttemptSession, SessionPhase};
pub use submit::{SubmissionReport, SubmitOutcome};
pub use workflow::SessionWorkflow;
