//! Second-pass relevance scoring of retrieval candidates.

use std::path::Path;
use std::sync::Mutex;

use ort::inputs;
use ort::session::Session;
use ort::value::Tensor;
use serde::Serialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::{fetch_model, load_session, load_tokenizer, wants_token_type_ids};
use crate::errors::Error;

/// One reranked candidate: position in the input slice and its relevance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RerankHit {
    pub index: usize,
    /// Higher is more relevant.
    pub score: f64,
}

/// Joint (query, candidate) relevance scorer.
pub trait RerankProvider: Send + Sync {
    /// Score `candidates` against `query` and return at most `top_k` hits,
    /// most relevant first.
    fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankHit>, Error>;
}

/// Order raw scores descending and keep the best `top_k`.
pub fn rank_scores(scores: &[f64], top_k: usize) -> Vec<RerankHit> {
    let mut hits: Vec<RerankHit> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| RerankHit { index, score })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}

fn sigmoid(x: f32) -> f64 {
    1.0 / (1.0 + (-(x as f64)).exp())
}

/// ONNX cross-encoder (bge-reranker-base by default).
///
/// Each candidate is encoded together with the query as a sentence pair and
/// the single output logit is squashed to `[0, 1]`.
pub struct CrossEncoderReranker {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    requires_token_type_ids: bool,
}

impl CrossEncoderReranker {
    pub fn new(model_id: &str, cache_dir: &Path) -> Result<Self, Error> {
        let (model_path, tokenizer_path) = fetch_model(model_id, cache_dir)?;
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let session = load_session(&model_path)?;
        let requires_token_type_ids = wants_token_type_ids(&session);
        info!(model = model_id, "rerank model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            requires_token_type_ids,
        })
    }

    fn score_pair(&self, query: &str, candidate: &str) -> Result<f64, Error> {
        let encoding = self.tokenizer.encode((query, candidate), true)?;
        let seq_len = encoding.get_ids().len();

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        let input_ids_tensor = Tensor::from_array(([1usize, seq_len], input_ids))?;
        let attention_mask_tensor = Tensor::from_array(([1usize, seq_len], attention_mask))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("rerank session lock poisoned".to_string()))?;

        let outputs = if self.requires_token_type_ids {
            let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_ids_tensor = Tensor::from_array(([1usize, seq_len], type_ids))?;
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => type_ids_tensor
            ])?
        } else {
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])?
        };

        let (_, logits) = outputs
            .get("logits")
            .ok_or_else(|| Error::Inference("Output tensor 'logits' not found".to_string()))?
            .try_extract_tensor::<f32>()?;

        let logit = logits
            .first()
            .copied()
            .ok_or_else(|| Error::Inference("Empty logits tensor".to_string()))?;
        Ok(sigmoid(logit))
    }
}

impl RerankProvider for CrossEncoderReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankHit>, Error> {
        debug!(candidates = candidates.len(), top_k, "reranking");
        let scores = candidates
            .iter()
            .map(|candidate| self.score_pair(query, candidate))
            .collect::<Result<Vec<f64>, Error>>()?;
        Ok(rank_scores(&scores, top_k))
    }
}
