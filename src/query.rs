//! Query inputs and retrieval results.

use serde::Serialize;

/// Separator placed between turns when building a context string.
pub const CONTEXT_SEPARATOR: &str = " ";

/// The three shapes a memory query can take.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// A ready-made query embedding, searched as is.
    Vector(Vec<f32>),
    /// Consecutive turns treated as one context string.
    Context(Vec<String>),
    /// A single utterance, possibly one already stored.
    Utterance(String),
}

impl QueryInput {
    /// Text handed to the reranker: the joined context or the utterance.
    /// Bare vectors have none.
    pub fn query_text(&self) -> Option<String> {
        match self {
            QueryInput::Vector(_) => None,
            QueryInput::Context(texts) => Some(join_context(texts.iter().map(String::as_str))),
            QueryInput::Utterance(text) => Some(text.clone()),
        }
    }

    /// Reason this input cannot be routed, if any.
    pub fn malformed(&self) -> Option<&'static str> {
        match self {
            QueryInput::Vector(v) if v.is_empty() => Some("empty query vector"),
            QueryInput::Vector(v) if v.iter().any(|x| !x.is_finite()) => {
                Some("query vector contains NaN or infinite values")
            }
            QueryInput::Context(texts) if texts.iter().all(|t| t.trim().is_empty()) => {
                Some("empty context list")
            }
            QueryInput::Utterance(text) if text.trim().is_empty() => Some("blank utterance"),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryInput::Vector(_) => "vector",
            QueryInput::Context(_) => "context",
            QueryInput::Utterance(_) => "utterance",
        }
    }
}

impl From<Vec<f32>> for QueryInput {
    fn from(v: Vec<f32>) -> Self {
        QueryInput::Vector(v)
    }
}

impl From<&[f32]> for QueryInput {
    fn from(v: &[f32]) -> Self {
        QueryInput::Vector(v.to_vec())
    }
}

impl From<Vec<String>> for QueryInput {
    fn from(texts: Vec<String>) -> Self {
        QueryInput::Context(texts)
    }
}

impl From<&[&str]> for QueryInput {
    fn from(texts: &[&str]) -> Self {
        QueryInput::Context(texts.iter().map(|t| t.to_string()).collect())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Utterance(text)
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Utterance(text.to_string())
    }
}

/// Join turns oldest to newest into one context string.
pub fn join_context<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .collect::<Vec<&str>>()
        .join(CONTEXT_SEPARATOR)
}

/// A raw-memory retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMemoryHit {
    pub id: i64,
    pub text: String,
    /// Cosine distance, or `1 - relevance` once reranked. Lower is closer.
    pub distance: f64,
}

/// A summary-memory retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMemoryHit {
    pub id: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub summary_text: String,
    /// Cosine distance, or `1 - relevance` once reranked. Lower is closer.
    pub distance: f64,
}
