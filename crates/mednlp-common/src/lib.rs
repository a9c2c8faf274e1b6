//! mednlp-common — Shared error type and the response cache contract used across all mednlp crates.

pub mod error;
pub mod stash;

pub use error::{MedNlpError, Result};
pub use stash::{DirectoryStash, MemoryStash, Stash};
