//! Environment variable parsing utilities for configuration.

use crate::errors::Error;
use std::path::PathBuf;

use super::paths;

pub const DATA_DIR_VAR: &str = "MNEMOS_DATA_DIR";
pub const EMBEDDING_MODEL_VAR: &str = "MNEMOS_EMBEDDING_MODEL";
pub const RERANK_MODEL_VAR: &str = "MNEMOS_RERANK_MODEL";
pub const MODEL_CACHE_VAR: &str = "MNEMOS_MODEL_CACHE";
pub const SHORT_TERM_CAPACITY_VAR: &str = "MNEMOS_SHORT_TERM_CAPACITY";
pub const CONTEXT_WINDOW_VAR: &str = "MNEMOS_CONTEXT_WINDOW";
pub const DEFAULT_TOP_K_VAR: &str = "MNEMOS_DEFAULT_TOP_K";
pub const SUMMARY_EXCERPT_CHARS_VAR: &str = "MNEMOS_SUMMARY_EXCERPT_CHARS";
pub const EMBEDDING_PREFIX_VAR: &str = "MNEMOS_EMBEDDING_PREFIX";

/// Every environment variable the configuration reads.
pub const ENV_VARS: [&str; 9] = [
    DATA_DIR_VAR,
    EMBEDDING_MODEL_VAR,
    RERANK_MODEL_VAR,
    MODEL_CACHE_VAR,
    SHORT_TERM_CAPACITY_VAR,
    CONTEXT_WINDOW_VAR,
    DEFAULT_TOP_K_VAR,
    SUMMARY_EXCERPT_CHARS_VAR,
    EMBEDDING_PREFIX_VAR,
];

/// Parse environment variable value or return error if empty/whitespace.
fn parse_env_string(name: &str, value: &str) -> Result<String, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Parse environment variable as a path, expanding tilde.
fn parse_env_path(name: &str, value: &str) -> Result<PathBuf, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(paths::expand_tilde_path(&PathBuf::from(value)))
}

/// Parse environment variable as a non-negative integer.
fn parse_env_usize(name: &str, value: &str) -> Result<usize, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}

/// Replace `target` with the value of `name`, if set.
pub fn apply_string_override(name: &str, target: &mut String) -> Result<(), Error> {
    if let Ok(val) = std::env::var(name) {
        *target = parse_env_string(name, &val)?;
    }
    Ok(())
}

/// Replace `target` with the raw value of `name`, if set. Empty is allowed.
pub fn apply_raw_string_override(name: &str, target: &mut String) {
    if let Ok(val) = std::env::var(name) {
        *target = val;
    }
}

/// Replace `target` with the tilde-expanded value of `name`, if set.
pub fn apply_path_override(name: &str, target: &mut PathBuf) -> Result<(), Error> {
    if let Ok(val) = std::env::var(name) {
        *target = parse_env_path(name, &val)?;
    }
    Ok(())
}

/// Replace `target` with the integer value of `name`, if set.
pub fn apply_usize_override(name: &str, target: &mut usize) -> Result<(), Error> {
    if let Ok(val) = std::env::var(name) {
        *target = parse_env_usize(name, &val)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_string_empty() {
        let result = parse_env_string("TEST_VAR", "");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_env_string_whitespace() {
        let result = parse_env_string("TEST_VAR", "   ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_env_string_valid() {
        let result = parse_env_string("TEST_VAR", "valid");
        assert_eq!(result.unwrap(), "valid");
    }

    #[test]
    fn test_parse_env_usize_invalid() {
        assert!(matches!(
            parse_env_usize("TEST_USIZE", "five"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_env_usize("TEST_USIZE", "-3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_env_usize_valid() {
        assert_eq!(parse_env_usize("TEST_USIZE", " 42 ").unwrap(), 42);
    }

    #[test]
    fn test_parse_env_path_absolute() {
        assert_eq!(
            parse_env_path("TEST_PATH", "/var/lib/mnemos").unwrap(),
            PathBuf::from("/var/lib/mnemos")
        );
    }
}
