//! Deterministic in-process providers for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::clock::ManualClock;
use crate::embedding::EmbeddingProvider;
use crate::errors::Error;
use crate::rerank::{rank_scores, RerankHit, RerankProvider};
use crate::summarizer::Summarizer;

use super::store::{ClientSettings, Providers, UserMemoryClient};

pub(crate) const TEST_DIMS: usize = 32;
pub(crate) const CLOCK_START: i64 = 1_700_000_000;

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Bag-of-words vector: each token adds 1 to a hashed bucket.
pub(crate) fn bag_of_words(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    for token in tokens(text) {
        vector[(fnv1a(&token) % dims as u64) as usize] += 1.0;
    }
    vector
}

/// Hashing embedder that records every text it is asked to embed.
pub(crate) struct HashingEmbedder {
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl HashingEmbedder {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_call(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn dims(&self) -> usize {
        TEST_DIMS
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        self.calls.lock().unwrap().extend(texts.iter().cloned());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider("embedding service unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| bag_of_words(t, TEST_DIMS)).collect())
    }
}

/// Reranker scoring candidates by the share of query tokens they contain.
pub(crate) struct CountingReranker {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingReranker {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl RerankProvider for CountingReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankHit>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider("rerank service unavailable".to_string()));
        }
        let query_tokens: Vec<String> = tokens(query).collect();
        let scores: Vec<f64> = candidates
            .iter()
            .map(|candidate| {
                let candidate_tokens: Vec<String> = tokens(candidate).collect();
                let shared = query_tokens
                    .iter()
                    .filter(|t| candidate_tokens.contains(t))
                    .count();
                shared as f64 / query_tokens.len().max(1) as f64
            })
            .collect();
        Ok(rank_scores(&scores, top_k))
    }
}

/// Summarizer that records its inputs and prefixes them.
pub(crate) struct RecordingSummarizer {
    inputs: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingSummarizer {
    pub(crate) fn new() -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Summarizer for RecordingSummarizer {
    fn summarize(&self, text: &str) -> Result<String, Error> {
        self.inputs.lock().unwrap().push(text.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider("summarizer unavailable".to_string()));
        }
        Ok(format!("Summary: {}", text))
    }
}

/// Fakes plus the handles tests need to inspect them.
pub(crate) struct Fakes {
    pub(crate) embedder: Arc<HashingEmbedder>,
    pub(crate) reranker: Arc<CountingReranker>,
    pub(crate) summarizer: Arc<RecordingSummarizer>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        Self {
            embedder: Arc::new(HashingEmbedder::new()),
            reranker: Arc::new(CountingReranker::new()),
            summarizer: Arc::new(RecordingSummarizer::new()),
            clock: Arc::new(ManualClock::new(CLOCK_START)),
        }
    }

    pub(crate) fn providers(&self) -> Providers {
        Providers {
            embedder: self.embedder.clone(),
            reranker: self.reranker.clone(),
            summarizer: self.summarizer.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// A client in a temporary directory wired to fresh fakes.
pub(crate) struct Harness {
    pub(crate) client: UserMemoryClient,
    pub(crate) fakes: Fakes,
    pub(crate) dir: TempDir,
}

pub(crate) fn harness() -> Harness {
    harness_with(ClientSettings::default())
}

pub(crate) fn harness_with(settings: ClientSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let fakes = Fakes::new();
    let client =
        UserMemoryClient::open("u1", &dir.path().join("u1"), fakes.providers(), settings).unwrap();
    Harness { client, fakes, dir }
}

impl Harness {
    /// Insert turns one second apart, returning their ids.
    pub(crate) fn insert_all(&self, texts: &[&str]) -> Vec<i64> {
        texts
            .iter()
            .map(|text| {
                self.fakes.clock.advance(1);
                self.client.insert_record("user", text).unwrap().id
            })
            .collect()
    }
}
