use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "scene_cast.toml";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub segment: SegmentConfig,
    pub mentions: MentionConfig,
    pub llm: LlmConfig,
    pub ner: NerConfig,
}

/// TextTiling parameters.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SegmentConfig {
    /// Words per pseudo-sentence
    pub block_size: usize,
    /// Pseudo-sentences compared on each side of a gap
    pub block_window: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            block_size: 20,
            block_window: 10,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MentionConfig {
    /// Characters kept on each side of a mention as its context
    pub context_radius: usize,
}

impl Default for MentionConfig {
    fn default() -> Self {
        MentionConfig { context_radius: 5 }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: usize,
    pub api_base: String,
    /// Fallback when ANTHROPIC_API_KEY is unset
    pub api_key_file: PathBuf,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            api_base: "https://api.anthropic.com/v1".to_string(),
            api_key_file: PathBuf::from("anthropic-api-key.secret"),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct NerConfig {
    /// External NER service; the built-in recogniser is used when unset.
    pub endpoint: Option<String>,
}

pub fn load_config_from_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Explicit path, else `scene_cast.toml` if present, else defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_config_from_file(path),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                load_config_from_file(fallback)
            } else {
                Ok(Config::default())
            }
        }
    }
}
