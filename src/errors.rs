//! Error types for mnemos.

use thiserror::Error;

/// Main error type for mnemos operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error raised outside the storage layers (e.g. while closing a connection).
    #[error("SQLite error: {0}")]
    SQLite(#[from] rusqlite::Error),

    /// Relational store error.
    #[error("Dialogue store error: {0}")]
    Store(#[from] crate::sqlite::Error),

    /// Vector index error.
    #[error("Vector index error: {0}")]
    Vector(#[from] crate::vector::Error),

    /// ONNX inference error.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Tokenization error.
    #[error("Tokenization error: {0}")]
    Tokenization(#[from] tokenizers::Error),

    /// ONNX session error.
    #[error("ONNX session error: {0}")]
    Onnx(#[from] ort::Error),

    /// HuggingFace Hub error.
    #[error("HuggingFace Hub error: {0}")]
    HfHub(#[from] hf_hub::api::sync::ApiError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// User identifier cannot be used as a storage key.
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// Operation on a client whose connections were released.
    #[error("Memory client for user '{0}' is closed")]
    ClientClosed(String),

    /// External provider (embedding, rerank, summarizer) failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}
