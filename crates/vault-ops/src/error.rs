//! Error type for tool operations.

use thiserror::Error;

use crate::answer::AnswerError;

/// Anything that can go wrong while serving a tool call.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Vault(#[from] vault_types::VaultError),

    #[error(transparent)]
    Vector(#[from] vault_vector::VectorError),

    #[error(transparent)]
    Embedding(#[from] vault_embeddings::EmbeddingError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking vault work panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Missing or malformed tool arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
