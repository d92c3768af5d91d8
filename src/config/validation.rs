//! Configuration validation logic.

use crate::buffer::MAX_SHORT_TERM_CAPACITY;
use crate::errors::Error;
use crate::memory::MAX_CONTEXT_WINDOW;
use crate::vector::MAX_SEARCH_LIMIT;
use std::path::PathBuf;

/// Validates configuration values.
pub struct ConfigValidator {
    pub data_dir: PathBuf,
    pub model_cache: PathBuf,
    pub embedding_model: String,
    pub rerank_model: String,
    pub short_term_capacity: usize,
    pub context_window: usize,
    pub default_top_k: usize,
    pub summary_excerpt_chars: usize,
}

impl ConfigValidator {
    /// Validate all configuration values for correctness and constraints.
    ///
    /// Checks that:
    /// - Data directory and model cache are not empty
    /// - Model identifiers are not empty
    /// - Excerpt length is at least 1
    /// - Buffer capacity is between 1 and `MAX_SHORT_TERM_CAPACITY`
    /// - Context window is between 1 and `MAX_CONTEXT_WINDOW`
    /// - Default `top_k` is between 1 and `MAX_SEARCH_LIMIT`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any validation check fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_paths()?;
        self.validate_models()?;
        self.validate_range(
            "short_term_capacity",
            self.short_term_capacity,
            MAX_SHORT_TERM_CAPACITY,
        )?;
        self.validate_range("context_window", self.context_window, MAX_CONTEXT_WINDOW)?;
        self.validate_positive("summary_excerpt_chars", self.summary_excerpt_chars)?;
        self.validate_default_top_k()?;

        Ok(())
    }

    fn validate_paths(&self) -> Result<(), Error> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }
        if self.model_cache.as_os_str().is_empty() {
            return Err(Error::Config("Model cache cannot be empty".to_string()));
        }

        Ok(())
    }

    fn validate_models(&self) -> Result<(), Error> {
        if self.embedding_model.trim().is_empty() {
            return Err(Error::Config("Embedding model cannot be empty".to_string()));
        }
        if self.rerank_model.trim().is_empty() {
            return Err(Error::Config("Rerank model cannot be empty".to_string()));
        }

        Ok(())
    }

    fn validate_positive(&self, name: &str, value: usize) -> Result<(), Error> {
        if value == 0 {
            return Err(Error::Config(format!("Invalid {name}: must be at least 1")));
        }

        Ok(())
    }

    fn validate_range(&self, name: &str, value: usize, max: usize) -> Result<(), Error> {
        if value == 0 || value > max {
            return Err(Error::Config(format!(
                "Invalid {name}: {value} (must be between 1 and {max})"
            )));
        }

        Ok(())
    }

    fn validate_default_top_k(&self) -> Result<(), Error> {
        self.validate_range("default_top_k", self.default_top_k, MAX_SEARCH_LIMIT)
    }
}
