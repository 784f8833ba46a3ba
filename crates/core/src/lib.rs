#![forbid(unsafe_code)]

pub mod error;
pub mod fingerprint;
pub mod model;
pub mod time;

pub use error::QuizError;
pub use time::Clock;
