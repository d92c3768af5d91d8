//! Configuration system for mnemos.

mod env_parser;
mod loader;
mod overrides;
mod paths;
mod validation;

#[cfg(test)]
mod tests_utils;

use crate::embedding::BGE_RETRIEVAL_INSTRUCTION;
use crate::errors::Error;
use crate::memory::ClientSettings;
use std::path::{Path, PathBuf};

pub use env_parser::ENV_VARS;
pub use loader::{default_config_path, ConfigFile};

/// Configuration values with priority: defaults < config file < env vars.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per user.
    pub data_dir: PathBuf,

    /// HuggingFace embedding model identifier.
    pub embedding_model: String,

    /// Instruction prepended to every text before embedding.
    pub embedding_prefix: String,

    /// HuggingFace cross-encoder identifier used for reranking.
    pub rerank_model: String,

    /// Directory for caching ONNX models.
    pub model_cache: PathBuf,

    /// Maximum entries in each user's short-term buffer.
    pub short_term_capacity: usize,

    /// Turns embedded together per inserted record.
    pub context_window: usize,

    /// `top_k` used when a caller does not specify one.
    pub default_top_k: usize,

    /// Characters kept by the excerpt summarizer.
    pub summary_excerpt_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        // Use home directory with sensible fallback for systems without HOME
        let home = dirs::home_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        let mnemos_dir = home.join(".mnemos");

        Self {
            data_dir: mnemos_dir.join("users"),
            embedding_model: "BAAI/bge-small-en-v1.5".to_string(),
            embedding_prefix: BGE_RETRIEVAL_INSTRUCTION.to_string(),
            rerank_model: "BAAI/bge-reranker-base".to_string(),
            model_cache: mnemos_dir.join("models"),
            short_term_capacity: 200,
            context_window: 5,
            default_top_k: 3,
            summary_excerpt_chars: 50,
        }
    }
}

impl Config {
    /// Load configuration from the default file location plus environment.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&default_config_path())
    }

    /// Load configuration with defaults, values from `path` (if it exists),
    /// and environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let file_config = loader::load_from_file(path)?;

        let mut config = Config::default();

        if let Some(mut file) = file_config {
            paths::expand_tilde(&mut file.data_dir);
            paths::expand_tilde(&mut file.model_cache);
            config.merge_from_file(file);
        }

        overrides::apply_env_overrides(&mut config)?;

        config.validate()?;

        Ok(config)
    }

    /// Merge configuration from a file into this config.
    fn merge_from_file(&mut self, file: ConfigFile) {
        if !file.data_dir.as_os_str().is_empty() {
            self.data_dir = file.data_dir;
        }
        if !file.embedding_model.is_empty() {
            self.embedding_model = file.embedding_model;
        }
        if let Some(prefix) = file.embedding_prefix {
            self.embedding_prefix = prefix;
        }
        if !file.rerank_model.is_empty() {
            self.rerank_model = file.rerank_model;
        }
        if !file.model_cache.as_os_str().is_empty() {
            self.model_cache = file.model_cache;
        }
        if let Some(capacity) = file.short_term_capacity {
            self.short_term_capacity = capacity;
        }
        if let Some(window) = file.context_window {
            self.context_window = window;
        }
        if let Some(top_k) = file.default_top_k {
            self.default_top_k = top_k;
        }
        if let Some(chars) = file.summary_excerpt_chars {
            self.summary_excerpt_chars = chars;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), Error> {
        let validator = validation::ConfigValidator {
            data_dir: self.data_dir.clone(),
            model_cache: self.model_cache.clone(),
            embedding_model: self.embedding_model.clone(),
            rerank_model: self.rerank_model.clone(),
            short_term_capacity: self.short_term_capacity,
            context_window: self.context_window,
            default_top_k: self.default_top_k,
            summary_excerpt_chars: self.summary_excerpt_chars,
        };

        validator.validate()
    }

    /// Per-client tunables derived from this configuration.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            short_term_capacity: self.short_term_capacity,
            context_window: self.context_window,
        }
    }

    /// Ensure the data and model cache directories exist.
    pub fn ensure_directories(&self) -> Result<(), Error> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create data directory {}: {e}",
                self.data_dir.display()
            ))
        })?;

        if !self.model_cache.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.model_cache).map_err(|e| {
                Error::Config(format!(
                    "Failed to create model cache directory {}: {e}",
                    self.model_cache.display()
                ))
            })?;
        }

        Ok(())
    }
}
