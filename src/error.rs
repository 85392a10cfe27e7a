use thiserror::Error;

/// Configuration errors, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse embedded config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid chunk threshold {value:?}: {reason}")]
    InvalidThreshold { value: String, reason: String },
}

/// Summarization-related errors
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Prompt blocked by safety filter: {reason}")]
    Blocked { reason: String },
}
