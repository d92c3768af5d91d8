//! Configuration file loading and parsing.

use crate::errors::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML file.
///
/// Absent fields leave the corresponding default untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub embedding_model: String,

    /// Instruction prepended to every embedded text; `""` disables it.
    pub embedding_prefix: Option<String>,

    #[serde(default)]
    pub rerank_model: String,

    #[serde(default)]
    pub model_cache: PathBuf,

    pub short_term_capacity: Option<usize>,

    pub context_window: Option<usize>,

    pub default_top_k: Option<usize>,

    pub summary_excerpt_chars: Option<usize>,
}

/// `<config_dir>/mnemos/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));

    config_dir.join("mnemos/config.toml")
}

/// Load configuration from a TOML file. A missing file yields `None`.
pub fn load_from_file(config_path: &Path) -> Result<Option<ConfigFile>, Error> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {e}",
                config_path.display()
            ))
        })?;

        let config: ConfigFile = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file {}: {e}",
                config_path.display()
            ))
        })?;

        Ok(Some(config))
    } else {
        Ok(None)
    }
}
