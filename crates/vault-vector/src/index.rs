//! The similarity index seam used by the chunk pipeline.

use crate::error::VectorError;
use vault_embeddings::Embedding;

/// A chunk vector close to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Key of the chunk record in the metadata store
    pub vector_id: u64,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

impl Neighbor {
    pub fn new(vector_id: u64, score: f32) -> Self {
        Self { vector_id, score }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub vector_count: usize,
    pub dimension: usize,
    /// Bytes on disk; 0 until the index has been saved once
    pub size_bytes: u64,
}

/// Chunk vectors keyed by the ids handed out by the metadata store.
///
/// Implementations hold unit-length vectors and score with cosine
/// similarity.
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError>;

    /// Add every chunk vector of a note in one go.
    fn add_batch(&mut self, vectors: &[(u64, Embedding)]) -> Result<(), VectorError> {
        vectors
            .iter()
            .try_for_each(|(id, embedding)| self.add(*id, embedding))
    }

    /// Up to `k` neighbours of `query`, best first.
    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>, VectorError>;

    /// Drop one chunk vector. `Ok(false)` when `id` was not indexed.
    fn remove(&mut self, id: u64) -> Result<bool, VectorError>;

    fn contains(&self, id: u64) -> bool;

    fn stats(&self) -> IndexStats;

    fn save(&self) -> Result<(), VectorError>;

    /// Forget every vector, keeping the dimension.
    fn clear(&mut self) -> Result<(), VectorError>;
}
