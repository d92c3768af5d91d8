//! Environment variable overrides for configuration.

use crate::errors::Error;

use super::env_parser::{
    apply_path_override, apply_raw_string_override, apply_string_override, apply_usize_override,
    CONTEXT_WINDOW_VAR, DATA_DIR_VAR, DEFAULT_TOP_K_VAR, EMBEDDING_MODEL_VAR,
    EMBEDDING_PREFIX_VAR, MODEL_CACHE_VAR, RERANK_MODEL_VAR, SHORT_TERM_CAPACITY_VAR,
    SUMMARY_EXCERPT_CHARS_VAR,
};
use super::Config;

/// Apply environment variable overrides to configuration.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), Error> {
    apply_path_override(DATA_DIR_VAR, &mut config.data_dir)?;
    apply_string_override(EMBEDDING_MODEL_VAR, &mut config.embedding_model)?;
    apply_raw_string_override(EMBEDDING_PREFIX_VAR, &mut config.embedding_prefix);
    apply_string_override(RERANK_MODEL_VAR, &mut config.rerank_model)?;
    apply_path_override(MODEL_CACHE_VAR, &mut config.model_cache)?;
    apply_usize_override(SHORT_TERM_CAPACITY_VAR, &mut config.short_term_capacity)?;
    apply_usize_override(CONTEXT_WINDOW_VAR, &mut config.context_window)?;
    apply_usize_override(DEFAULT_TOP_K_VAR, &mut config.default_top_k)?;
    apply_usize_override(SUMMARY_EXCERPT_CHARS_VAR, &mut config.summary_excerpt_chars)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests_utils::{cleanup_env_vars, set_env, ENV_MUTEX};
    use std::path::PathBuf;

    #[test]
    fn test_env_var_overrides_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        set_env(DATA_DIR_VAR, "/custom/users");
        set_env(EMBEDDING_MODEL_VAR, "env/model");
        set_env(RERANK_MODEL_VAR, "env/reranker");
        set_env(MODEL_CACHE_VAR, "/custom/cache");
        set_env(CONTEXT_WINDOW_VAR, "8");
        set_env(DEFAULT_TOP_K_VAR, "4");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        cleanup_env_vars();

        assert_eq!(config.data_dir, PathBuf::from("/custom/users"));
        assert_eq!(config.embedding_model, "env/model");
        assert_eq!(config.rerank_model, "env/reranker");
        assert_eq!(config.model_cache, PathBuf::from("/custom/cache"));
        assert_eq!(config.context_window, 8);
        assert_eq!(config.default_top_k, 4);
        assert_eq!(config.short_term_capacity, 200);
    }

    #[test]
    fn test_unset_vars_leave_config_alone() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.embedding_model, Config::default().embedding_model);
        assert_eq!(config.summary_excerpt_chars, 50);
    }

    #[test]
    fn test_empty_env_var_fails_fast() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();
        set_env(EMBEDDING_MODEL_VAR, "  ");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        cleanup_env_vars();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_prefix_disables_instruction() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();
        set_env(EMBEDDING_PREFIX_VAR, "");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        cleanup_env_vars();

        assert_eq!(config.embedding_prefix, "");
    }

    #[test]
    fn test_non_numeric_env_var_fails_fast() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();
        set_env(SHORT_TERM_CAPACITY_VAR, "lots");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        cleanup_env_vars();

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
