//! Application configuration
//!
//! Built-in defaults are compiled in from config.toml. The API key and an
//! optional chunk-threshold override come from the environment; a local
//! .env file is honored.

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use tracing::info;

/// Environment variable holding the Gemini API key
const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Environment variable overriding the configured chunk threshold
const THRESHOLD_VAR: &str = "SUMMEET_CHUNK_THRESHOLD";

/// Compiled-in configuration (config.toml)
#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    pub summary: SummaryConfig,
    pub recognizer: RecognizerConfig,
}

/// Summarization settings
#[derive(Debug, Deserialize)]
pub(crate) struct SummaryConfig {
    /// Gemini model used for the rolling summary
    pub model: String,
    /// Minimum number of new transcript characters before re-summarizing
    pub chunk_threshold: usize,
}

/// Streaming recognizer settings
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RecognizerConfig {
    /// Gemini Live model used for speech recognition
    pub model: String,
    /// BCP-47 tag for the spoken language
    pub language: String,
    /// Live API WebSocket endpoint
    pub endpoint: String,
}

/// Runtime settings: compiled-in defaults plus the environment
pub(crate) struct Settings {
    pub config: Config,
    pub api_key: String,
}

/// Load configuration from the embedded config.toml and the environment
pub(crate) fn load() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    const CONFIG_TOML: &str = include_str!("../config.toml");
    let mut config: Config = toml::from_str(CONFIG_TOML)?;

    if let Ok(value) = env::var(THRESHOLD_VAR) {
        config.summary.chunk_threshold = parse_threshold(&value)?;
        info!(
            threshold = config.summary.chunk_threshold,
            "Chunk threshold overridden from environment"
        );
    }

    let api_key = env::var(API_KEY_VAR)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    Ok(Settings { config, api_key })
}

/// Parse a chunk threshold taken from the environment
fn parse_threshold(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidThreshold {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
