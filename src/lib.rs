//! mnemos - per-user conversational memory for dialogue agents.
//!
//! Each user gets a durable, time-ordered dialogue log, a vector index over
//! windowed dialogue context and over summaries, and a short in-memory buffer
//! of recent turns. Retrieval routes vectors, context lists and single
//! utterances differently and optionally reranks with a cross-encoder; a
//! watermark-driven job compacts history into summaries.
//! All operations are synchronous (no async/await required).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mnemos::{
//!     Config, CrossEncoderReranker, EmbeddingEngine, ExcerptSummarizer, MemoryRegistry,
//!     Providers, SystemClock,
//! };
//!
//! let config = Config::load().expect("load config");
//! config.ensure_directories().expect("create directories");
//!
//! let providers = Providers {
//!     embedder: Arc::new(
//!         EmbeddingEngine::new(&config.embedding_model, &config.model_cache)
//!             .expect("embedder")
//!             .with_prefix(config.embedding_prefix.as_str()),
//!     ),
//!     reranker: Arc::new(
//!         CrossEncoderReranker::new(&config.rerank_model, &config.model_cache).expect("reranker"),
//!     ),
//!     summarizer: Arc::new(ExcerptSummarizer::new(config.summary_excerpt_chars)),
//!     clock: Arc::new(SystemClock),
//! };
//! let registry = MemoryRegistry::new(&config.data_dir, config.client_settings(), providers);
//!
//! let client = registry.open("alice").expect("open user");
//! client.insert_record("user", "I adopted a cat named Miso").expect("insert");
//!
//! for hit in client.query_raw_memory("what is my cat called?", 3) {
//!     println!("{:.3}: {}", hit.distance, hit.text);
//! }
//!
//! client.summarize_memory().expect("summarize");
//! registry.shutdown().expect("shutdown");
//! ```

pub mod buffer;
pub mod clock;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod memory;
pub mod query;
pub mod registry;
pub mod rerank;
pub mod sqlite;
pub mod summarizer;
pub mod vector;

// Re-export public API
pub use buffer::ShortTermBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use embedding::{EmbeddingEngine, EmbeddingProvider};
pub use errors::Error;
pub use memory::{
    ClientSettings, InsertOutcome, Providers, SummarizeOutcome, UserMemoryClient,
};
pub use query::{QueryInput, RawMemoryHit, SummaryMemoryHit};
pub use registry::{validate_user_id, MemoryRegistry};
pub use rerank::{CrossEncoderReranker, RerankHit, RerankProvider};
pub use sqlite::{DialogueRecord, SummaryRecord};
pub use summarizer::{ExcerptSummarizer, Summarizer};
pub use vector::{Collection, MAX_SEARCH_LIMIT};
