//! Feature-hashing embedder.
//!
//! Maps lowercase word tokens into a fixed number of buckets. Texts that share
//! words land close together, which is enough for tests and for running the
//! tool on machines without the model files.
//!
//! Buckets come from SHA-256 so vectors saved to disk stay valid across
//! builds.

use sha2::{Digest, Sha256};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Deterministic bag-of-words embedder.
pub struct HashEmbedder {
    info: ModelInfo,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            info: ModelInfo {
                name: "feature-hash".to_string(),
                dimension,
                max_sequence_length: usize::MAX,
            },
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(head);
        let index = (hash % self.info.dimension as u64) as usize;
        // high bit picks the sign so collisions partly cancel
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingModel for HashEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if self.info.dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "dimension must be > 0".to_string(),
            ));
        }

        let mut values = vec![0.0f32; self.info.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(&token.to_lowercase());
            values[index] += sign;
        }

        Ok(Embedding::new(values))
    }
}
