//! Errors from loading the embedding model and embedding text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// `config.json` of the cached model could not be parsed
    #[error("Invalid model config: {0}")]
    ModelConfig(String),

    /// Fetching model files from the HuggingFace Hub failed
    #[error("Failed to download model: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An earlier load attempt failed; later calls report the same message
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// Empty batch, zero dimension and similar caller mistakes
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
