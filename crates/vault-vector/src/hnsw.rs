//! HNSW index implementation using usearch.
//!
//! Defaults favour recall over speed; a vault rarely holds more than a few
//! hundred thousand paragraphs.
//! - M = 16 (connections per layer)
//! - ef_construction = 200
//! - ef_search = 100

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};
use vault_embeddings::Embedding;

use crate::error::VectorError;
use crate::index::{IndexStats, Neighbor, VectorIndex};

/// File name of the persisted index inside the index directory.
pub const INDEX_FILE_NAME: &str = "chunks.usearch";

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match the model)
    pub dimension: usize,
    /// Connections per layer (M)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Directory holding the index file
    pub index_path: PathBuf,
    /// Initial reservation; grows on demand
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./.vault-index"),
            capacity: 10_000,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// usearch HNSW index behind a lock.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Open the persisted index, or create an empty one.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        let index_file = config.index_path.join(INDEX_FILE_NAME);
        let idx = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;

        if index_file.exists() {
            info!(path = ?index_file, "Opening existing vector index");
            idx.load(path_str(&index_file)?)
                .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;
            if idx.dimensions() != config.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: config.dimension,
                    actual: idx.dimensions(),
                });
            }
        } else {
            info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
            std::fs::create_dir_all(&config.index_path)?;
            idx.reserve(config.capacity)
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }

        Ok(Self {
            index: RwLock::new(idx),
            config,
        })
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE_NAME)
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<(), VectorError> {
        if embedding.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }
}

fn path_str(path: &std::path::Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.read().size()
    }

    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        self.check_dimension(embedding)?;

        let index = self.write();
        // a loaded index is reserved only for what it holds
        if index.size() >= index.capacity() {
            let grown = (index.capacity() * 2).max(self.config.capacity);
            index
                .reserve(grown)
                .map_err(|e| VectorError::Index(e.to_string()))?;
            debug!(capacity = grown, "Grew vector index");
        }
        index
            .add(id, &embedding.values)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        debug!(id, "Added vector");
        Ok(())
    }

    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>, VectorError> {
        self.check_dimension(query)?;

        let index = self.read();
        // usearch allocates result buffers for all `k` up front
        let k = k.min(index.size());
        if k == 0 {
            return Ok(Vec::new());
        }

        let matches = index
            .search(&query.values, k)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let results: Vec<Neighbor> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&id, &dist)| Neighbor::new(id, 1.0 - dist))
            .collect();

        debug!(k, found = results.len(), "Search complete");
        Ok(results)
    }

    fn remove(&mut self, id: u64) -> Result<bool, VectorError> {
        let removed = self
            .write()
            .remove(id)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(removed > 0)
    }

    fn contains(&self, id: u64) -> bool {
        self.read().contains(id)
    }

    fn stats(&self) -> IndexStats {
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            vector_count: self.len(),
            dimension: self.config.dimension,
            size_bytes,
        }
    }

    fn save(&self) -> Result<(), VectorError> {
        let path = self.index_file();
        let index = self.read();
        index
            .save(path_str(&path)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = index.size(), "Saved vector index");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), VectorError> {
        let fresh =
            Index::new(&self.config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        fresh
            .reserve(self.config.capacity)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        *self.write() = fresh;
        info!("Cleared vector index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn random_embedding(dim: usize) -> Embedding {
        use rand::Rng;
        let mut rng = rand::rng();
        let values: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() + 0.01).collect();
        Embedding::new(values)
    }

    #[test]
    fn test_create_index() {
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open_or_create(HnswConfig::new(384, temp.path())).unwrap();
        assert_eq!(index.dimension(), 384);
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_and_search_sorted() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(64, temp.path()).with_capacity(100);
        let mut index = HnswIndex::open_or_create(config).unwrap();

        for i in 0..10 {
            index.add(i, &random_embedding(64)).unwrap();
        }
        assert_eq!(index.len(), 10);

        let results = index.search(&random_embedding(64), 5).unwrap();
        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let temp = TempDir::new().unwrap();
        let mut index =
            HnswIndex::open_or_create(HnswConfig::new(32, temp.path()).with_capacity(50)).unwrap();

        let target = random_embedding(32);
        index.add(7, &target).unwrap();
        for i in 100..120 {
            index.add(i, &random_embedding(32)).unwrap();
        }

        let results = index.search(&target, 3).unwrap();
        assert_eq!(results[0].vector_id, 7);
        assert!(results[0].score > 0.99);
    }

    #[test]
    fn test_search_k_clamped_to_index_size() {
        let temp = TempDir::new().unwrap();
        let mut index =
            HnswIndex::open_or_create(HnswConfig::new(16, temp.path()).with_capacity(8)).unwrap();
        for i in 0..3 {
            index.add(i, &random_embedding(16)).unwrap();
        }

        let results = index.search(&random_embedding(16), 1 << 40).unwrap();
        assert_eq!(results.len(), 3);
        let results = index.search(&random_embedding(16), usize::MAX).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_search_empty_index() {
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open_or_create(HnswConfig::new(16, temp.path())).unwrap();
        assert!(index.search(&random_embedding(16), 5).unwrap().is_empty());
    }

    #[test]
    fn test_grows_past_reservation_after_reload() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(16, temp.path()).with_capacity(4);

        {
            let mut index = HnswIndex::open_or_create(config.clone()).unwrap();
            for i in 0..4 {
                index.add(i, &random_embedding(16)).unwrap();
            }
            index.save().unwrap();
        }

        let mut index = HnswIndex::open_or_create(config).unwrap();
        assert_eq!(index.len(), 4);
        for i in 4..12 {
            index.add(i, &random_embedding(16)).unwrap();
        }
        assert_eq!(index.len(), 12);
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let temp = TempDir::new().unwrap();
        {
            let mut index =
                HnswIndex::open_or_create(HnswConfig::new(16, temp.path()).with_capacity(8))
                    .unwrap();
            index.add(1, &random_embedding(16)).unwrap();
            index.save().unwrap();
        }

        let result = HnswIndex::open_or_create(HnswConfig::new(32, temp.path()));
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch { expected: 32, actual: 16 })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let mut index = HnswIndex::open_or_create(HnswConfig::new(64, temp.path())).unwrap();
        let result = index.add(0, &random_embedding(32));
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let mut index =
            HnswIndex::open_or_create(HnswConfig::new(64, temp.path()).with_capacity(100)).unwrap();

        index.add(42, &random_embedding(64)).unwrap();
        index.add(43, &random_embedding(64)).unwrap();
        assert!(index.remove(42).unwrap());
        assert!(!index.contains(42));
        assert!(!index.remove(42).unwrap());

        index.clear().unwrap();
        assert!(!index.contains(43));
        assert!(index.is_empty());
    }
}
