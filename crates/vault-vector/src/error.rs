//! Errors raised by the chunk index.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    /// Failure reported by usearch
    #[error("Index error: {0}")]
    Index(String),

    /// A vector whose length does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk record or key in the metadata store could not be encoded or decoded
    #[error("Chunk metadata error: {0}")]
    Metadata(String),

    #[error("Metadata store error: {0}")]
    Store(#[from] rocksdb::Error),

    /// Chunk text could not be embedded
    #[error(transparent)]
    Embedding(#[from] vault_embeddings::EmbeddingError),
}
