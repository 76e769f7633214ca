//! Embedding model trait and vector type.

use std::sync::Arc;

use crate::error::EmbeddingError;

/// A unit-length embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Build an embedding, scaling `values` to unit length.
    /// An all-zero vector is kept as is.
    pub fn new(values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self {
                values: values.into_iter().map(|x| x / norm).collect(),
            }
        } else {
            Self { values }
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]; 0.0 when dimensions differ.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Static facts about a model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

/// Text to vector.
///
/// Implementations are shared between the indexer and the query path, so they
/// must be `Send + Sync`.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed several texts; output order matches input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_batch(&refs)
    }
}

impl<E: EmbeddingModel + ?Sized> EmbeddingModel for Arc<E> {
    fn info(&self) -> &ModelInfo {
        (**self).info()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}
