//! Text-to-vector conversion.
//!
//! `EmbeddingProvider` is the contract the memory core depends on. The bundled
//! implementation, `EmbeddingEngine`, runs a sentence-embedding ONNX model
//! (bge-small-en-v1.5 by default) with mean pooling and L2 normalization.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hf_hub::api::sync::ApiBuilder;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::errors::Error;

/// Maximum tokens fed to a model; longer inputs are truncated.
pub const MAX_SEQUENCE_TOKENS: usize = 512;

/// Retrieval instruction the BGE English models expect before each text.
pub const BGE_RETRIEVAL_INSTRUCTION: &str =
    "Represent this sentence for searching relevant passages: ";

const PROBE_TEXT: &str = "dimension probe";

/// Stateless text embedding service shared by every user's memory client.
///
/// Output is deterministic for a given model, and every vector has
/// [`dims`](Self::dims) components.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of every vector this provider returns.
    fn dims(&self) -> usize;

    /// Embed each text, returning one vector per input in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, Error> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("embedding provider returned no vectors".to_string()))
    }
}

/// Download (or reuse from `cache_dir`) a model's ONNX graph and tokenizer.
pub(crate) fn fetch_model(model_id: &str, cache_dir: &Path) -> Result<(PathBuf, PathBuf), Error> {
    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir.to_path_buf())
        .build()?;
    let repo = api.model(model_id.to_string());

    let model_path = repo
        .get("onnx/model.onnx")
        .or_else(|_| repo.get("model.onnx"))?;
    let tokenizer_path = repo.get("tokenizer.json")?;
    Ok((model_path, tokenizer_path))
}

/// Load a tokenizer with truncation and no padding (one sequence per run).
pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer, Error> {
    let mut tokenizer = Tokenizer::from_file(path)?;
    tokenizer
        .with_padding(None)
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_TOKENS,
            ..Default::default()
        }))?;
    Ok(tokenizer)
}

pub(crate) fn load_session(model_path: &Path) -> Result<Session, Error> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level1)
        .map_err(ort::Error::from)?
        .commit_from_file(model_path)?;
    Ok(session)
}

pub(crate) fn wants_token_type_ids(session: &Session) -> bool {
    session
        .inputs()
        .iter()
        .any(|input| input.name() == "token_type_ids")
}

/// ONNX sentence-embedding engine.
///
/// The session sits behind a mutex because running it needs exclusive
/// access; the tokenizer is shared freely.
pub struct EmbeddingEngine {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    requires_token_type_ids: bool,
    dims: usize,
    prefix: String,
}

/// `text` with the instruction `prefix` in front; empty text stays empty.
fn with_instruction(prefix: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{prefix}{text}")
    }
}

impl EmbeddingEngine {
    /// Load model from `cache_dir` or download on first use.
    ///
    /// The output dimensionality is read from the model by embedding a short
    /// probe text.
    pub fn new(model_id: &str, cache_dir: &Path) -> Result<Self, Error> {
        let (model_path, tokenizer_path) = fetch_model(model_id, cache_dir)?;
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let session = load_session(&model_path)?;
        let requires_token_type_ids = wants_token_type_ids(&session);

        let mut engine = EmbeddingEngine {
            session: Mutex::new(session),
            tokenizer,
            requires_token_type_ids,
            dims: 0,
            prefix: String::new(),
        };
        engine.dims = engine.pooled(PROBE_TEXT)?.len();
        info!(model = model_id, dims = engine.dims, "embedding model loaded");
        Ok(engine)
    }

    /// Prepend `prefix` to every text before encoding.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Mean-pooled, L2-normalized embedding of one text.
    fn pooled(&self, text: &str) -> Result<Vec<f32>, Error> {
        let encoding = self.tokenizer.encode(text, true)?;
        let input_ids = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();

        if input_ids.is_empty() {
            return Ok(vec![0.0f32; self.dims]);
        }

        let seq_len = input_ids.len();

        let input_ids_vec: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let attention_mask_vec: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();

        let input_ids_tensor = Tensor::from_array(([1usize, seq_len], input_ids_vec))?;
        let attention_mask_tensor = Tensor::from_array(([1usize, seq_len], attention_mask_vec))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("embedding session lock poisoned".to_string()))?;

        let outputs = if self.requires_token_type_ids {
            let token_type_ids_vec: Vec<i64> = vec![0i64; seq_len];
            let token_type_ids_tensor =
                Tensor::from_array(([1usize, seq_len], token_type_ids_vec))?;
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            ])?
        } else {
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])?
        };

        let (shape, data) = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| {
                Error::Inference(
                    "Output tensor 'last_hidden_state' or 'token_embeddings' not found".to_string(),
                )
            })?
            .try_extract_tensor::<f32>()?;

        if shape.len() != 3 {
            return Err(Error::Inference(format!(
                "Expected 3D output (batch, seq_len, hidden), got {:?}",
                shape
            )));
        }

        let batch_size = shape[0] as usize;
        let hidden_dim = shape[2] as usize;

        if batch_size != 1 || (self.dims != 0 && hidden_dim != self.dims) {
            return Err(Error::Inference(format!(
                "Unexpected output shape: {:?}, batch=1, hidden={} expected",
                shape, self.dims
            )));
        }

        Ok(mean_pool(data, attention_mask, seq_len, hidden_dim))
    }
}

impl EmbeddingProvider for EmbeddingEngine {
    fn dims(&self) -> usize {
        self.dims
    }

    /// Empty strings map to the zero vector.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        debug!(count = texts.len(), "embedding texts");
        texts
            .iter()
            .map(|text| {
                if text.is_empty() {
                    Ok(vec![0.0f32; self.dims])
                } else {
                    self.pooled(&with_instruction(&self.prefix, text))
                }
            })
            .collect()
    }
}

/// Attention-masked mean over token vectors, then L2 normalization.
fn mean_pool(data: &[f32], attention_mask: &[u32], seq_len: usize, hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];

    for (token_idx, chunk) in data.chunks(hidden_dim).take(seq_len).enumerate() {
        let mask_value = attention_mask.get(token_idx).copied().unwrap_or(0) as f32;

        for (dim, pooled_value) in pooled.iter_mut().enumerate() {
            *pooled_value += chunk[dim] * mask_value;
        }
    }

    let mask_sum: f32 = attention_mask
        .iter()
        .take(seq_len)
        .map(|&m| m as f32)
        .sum::<f32>()
        .max(1e-9);

    for value in pooled.iter_mut() {
        *value /= mask_sum;
    }

    l2_normalize(&pooled)
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let norm = norm.max(1e-9);

    vec.iter().map(|&x| x / norm).collect()
}
