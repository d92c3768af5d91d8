//! Per-user memory client.
//!
//! `UserMemoryClient` ties together one user's dialogue log, vector index and
//! short-term buffer, and exposes insertion, retrieval and summarization.

mod insert;
mod retrieve;
mod summarize;

// pub(crate): module internals hidden; public items re-exported explicitly via lib.rs
pub(crate) mod store;

pub use insert::InsertOutcome;
pub use store::{
    ClientSettings, Providers, UserMemoryClient, DEFAULT_CONTEXT_WINDOW,
    DEFAULT_SHORT_TERM_CAPACITY, DIALOGUE_DB_FILE, MAX_CONTEXT_WINDOW, VECTOR_DB_FILE,
};
pub use summarize::SummarizeOutcome;

#[cfg(test)]
pub(crate) mod testing;
