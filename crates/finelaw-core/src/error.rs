//! FineLaw error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FineLawError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FineLawError {
    /// Throttling from the remote service; the only class worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FineLawError::RateLimited { .. })
    }
}

impl From<rusqlite::Error> for FineLawError {
    fn from(e: rusqlite::Error) -> Self {
        FineLawError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for FineLawError {
    fn from(e: serde_json::Error) -> Self {
        FineLawError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FineLawError>;
