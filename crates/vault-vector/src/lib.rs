//! # vault-vector
//!
//! Similarity index over note chunks.
//!
//! - usearch HNSW index (cosine) persisted next to the vault
//! - RocksDB metadata linking vector ids back to note paths
//! - `ChunkIndexPipeline` that embeds, stores, replaces and prunes chunks

pub mod error;
pub mod hnsw;
pub mod index;
pub mod metadata;
pub mod pipeline;

pub use error::VectorError;
pub use hnsw::{HnswConfig, HnswIndex};
pub use index::{IndexStats, Neighbor, VectorIndex};
pub use metadata::{ChunkEntry, ChunkMetadata, CF_CHUNK_META};
pub use pipeline::{ChunkHit, ChunkIndexPipeline, IndexingStats, NoteChunks, PipelineConfig};
