//! Query routing over the raw and summary collections, with optional rerank.

use std::iter;

use tracing::{debug, warn};

use crate::errors::Error;
use crate::query::{join_context, QueryInput, RawMemoryHit, SummaryMemoryHit};
use crate::vector::validate_limit;

use super::store::UserMemoryClient;

/// A retrieval result the reranker can reorder.
trait Rerankable {
    fn candidate_text(&self) -> &str;
    fn set_distance(&mut self, distance: f64);
}

impl Rerankable for RawMemoryHit {
    fn candidate_text(&self) -> &str {
        &self.text
    }

    fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }
}

impl Rerankable for SummaryMemoryHit {
    fn candidate_text(&self) -> &str {
        &self.summary_text
    }

    fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }
}

impl UserMemoryClient {
    /// Retrieve stored dialogue turns relevant to `query`.
    ///
    /// Routing depends on the input shape:
    /// - a vector is searched as is;
    /// - a context list is joined, embedded and searched;
    /// - an utterance that exists verbatim is embedded and the hits are
    ///   narrowed to that record's entry; any other utterance is embedded
    ///   together with the preceding turns, the same window it would get
    ///   once inserted.
    ///
    /// When `top_k > 1` and the query carries text, candidates are reranked
    /// and each distance becomes `1 - relevance`.
    ///
    /// Never fails: malformed input, a closed client and provider or index
    /// faults are logged and yield an empty (or unreranked) result.
    pub fn query_raw_memory(
        &self,
        query: impl Into<QueryInput>,
        top_k: usize,
    ) -> Vec<RawMemoryHit> {
        let query = query.into();
        if !self.accepts(&query, top_k, "raw") {
            return Vec::new();
        }

        let _read = self.read_gate();
        match self.try_query_raw(&query, top_k) {
            Ok(hits) => self.rerank(&query, hits, top_k),
            Err(e) => {
                warn!(
                    user_id = %self.user_id(),
                    kind = query.kind(),
                    error = %e,
                    "raw memory query failed"
                );
                Vec::new()
            }
        }
    }

    /// Retrieve summaries relevant to `query`.
    ///
    /// Same routing and rerank policy as
    /// [`query_raw_memory`](Self::query_raw_memory), except an utterance is
    /// always embedded directly.
    pub fn query_summary_memory(
        &self,
        query: impl Into<QueryInput>,
        top_k: usize,
    ) -> Vec<SummaryMemoryHit> {
        let query = query.into();
        if !self.accepts(&query, top_k, "summary") {
            return Vec::new();
        }

        let _read = self.read_gate();
        match self.try_query_summary(&query, top_k) {
            Ok(hits) => self.rerank(&query, hits, top_k),
            Err(e) => {
                warn!(
                    user_id = %self.user_id(),
                    kind = query.kind(),
                    error = %e,
                    "summary memory query failed"
                );
                Vec::new()
            }
        }
    }

    fn accepts(&self, query: &QueryInput, top_k: usize, collection: &str) -> bool {
        if let Some(reason) = query.malformed() {
            warn!(
                user_id = %self.user_id(),
                collection,
                reason,
                "malformed memory query ignored"
            );
            return false;
        }
        if let Err(e) = validate_limit(top_k) {
            warn!(
                user_id = %self.user_id(),
                collection,
                top_k,
                error = %e,
                "memory query ignored"
            );
            return false;
        }
        true
    }

    fn embed_context<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Result<Vec<f32>, Error> {
        self.providers.embedder.embed_one(&join_context(texts))
    }

    fn try_query_raw(&self, query: &QueryInput, top_k: usize) -> Result<Vec<RawMemoryHit>, Error> {
        let (embedding, exact_id) = match query {
            QueryInput::Vector(v) => (v.clone(), None),
            QueryInput::Context(texts) => {
                (self.embed_context(texts.iter().map(String::as_str))?, None)
            }
            QueryInput::Utterance(text) => match self.with_db(|db| db.find_exact_text(text))? {
                Some(record) => {
                    debug!(
                        user_id = %self.user_id(),
                        record_id = record.id,
                        "utterance matches stored record"
                    );
                    (self.providers.embedder.embed_one(text)?, Some(record.id))
                }
                None => {
                    let preceding = self.settings.context_window.saturating_sub(1);
                    let prior = self.with_db(|db| db.latest_dialogues(preceding))?;
                    let window = prior
                        .iter()
                        .rev()
                        .map(|record| record.text.as_str())
                        .chain(iter::once(text.as_str()));
                    (self.embed_context(window)?, None)
                }
            },
        };

        let mut hits = self.with_index(|index| Ok(index.search_raw(&embedding, top_k)))?;
        if let Some(id) = exact_id {
            hits.retain(|hit| hit.id == id);
        }

        self.with_db(|db| {
            let mut resolved = Vec::with_capacity(hits.len());
            for hit in hits {
                match db.get_dialogue(hit.id)? {
                    Some(record) => resolved.push(RawMemoryHit {
                        id: hit.id,
                        text: record.text,
                        distance: hit.distance,
                    }),
                    None => debug!(record_id = hit.id, "vector entry has no dialogue row, skipped"),
                }
            }
            Ok(resolved)
        })
    }

    fn try_query_summary(
        &self,
        query: &QueryInput,
        top_k: usize,
    ) -> Result<Vec<SummaryMemoryHit>, Error> {
        let embedding = match query {
            QueryInput::Vector(v) => v.clone(),
            QueryInput::Context(texts) => self.embed_context(texts.iter().map(String::as_str))?,
            QueryInput::Utterance(text) => self.providers.embedder.embed_one(text)?,
        };

        let hits = self.with_index(|index| Ok(index.search_summary(&embedding, top_k)))?;
        Ok(hits
            .into_iter()
            .map(|hit| SummaryMemoryHit {
                id: hit.id,
                start_time: hit.start_time,
                end_time: hit.end_time,
                summary_text: hit.summary_text,
                distance: hit.distance,
            })
            .collect())
    }

    /// Reorder `hits` by joint query/candidate relevance.
    ///
    /// Skipped for `top_k <= 1`, bare-vector queries and empty results. On a
    /// rerank failure the vector order is kept.
    fn rerank<H: Rerankable>(&self, query: &QueryInput, hits: Vec<H>, top_k: usize) -> Vec<H> {
        if top_k <= 1 || hits.is_empty() {
            return hits;
        }
        let Some(query_text) = query.query_text() else {
            return hits;
        };

        let candidates: Vec<String> = hits
            .iter()
            .map(|hit| hit.candidate_text().to_string())
            .collect();
        let ranked = match self.providers.reranker.rerank(&query_text, &candidates, top_k) {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!(user_id = %self.user_id(), error = %e, "rerank failed, keeping vector order");
                return hits;
            }
        };

        let mut slots: Vec<Option<H>> = hits.into_iter().map(Some).collect();
        ranked
            .into_iter()
            .filter_map(|ranked_hit| {
                let mut hit = slots.get_mut(ranked_hit.index)?.take()?;
                hit.set_distance(1.0 - ranked_hit.score);
                Some(hit)
            })
            .take(top_k)
            .collect()
    }
}
