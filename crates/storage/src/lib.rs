#![forbid(unsafe_code)]

pub mod memory;
pub mod store;

pub use memory::MemoryBackend;
pub use store::{SessionBackend, SessionStore, StoreError};
