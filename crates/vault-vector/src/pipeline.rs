//! Chunk indexing pipeline.
//!
//! Embeds note paragraphs in batches, adds them to the HNSW index and records
//! their metadata. Also owns removal, full rebuilds, stale pruning and the
//! query side of retrieval.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use vault_embeddings::{Embedding, EmbeddingModel};

use crate::error::VectorError;
use crate::hnsw::{HnswConfig, HnswIndex, INDEX_FILE_NAME};
use crate::index::{IndexStats, VectorIndex};
use crate::metadata::{ChunkEntry, ChunkMetadata};

/// Name of the metadata store directory inside the index directory.
pub const METADATA_DIR: &str = "metadata";

/// Statistics from an indexing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    /// Notes handed to the pipeline
    pub notes_processed: usize,
    /// Notes with no embeddable paragraphs
    pub notes_skipped: usize,
    /// Vectors added to the index
    pub chunks_added: usize,
    /// Chunks that failed to embed or store
    pub errors: usize,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Paragraphs per embedding call
    pub batch_size: usize,
    /// Keep going when a batch fails
    pub continue_on_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            continue_on_error: true,
        }
    }
}

/// A note split into paragraphs, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChunks {
    pub note_path: String,
    pub content_hash: String,
    pub chunks: Vec<String>,
}

/// A retrieved paragraph with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub entry: ChunkEntry,
    pub score: f32,
}

/// Chunk indexing and retrieval over one index directory.
pub struct ChunkIndexPipeline<E: EmbeddingModel + ?Sized> {
    embedder: Arc<E>,
    index: RwLock<HnswIndex>,
    metadata: ChunkMetadata,
    config: PipelineConfig,
}

impl<E: EmbeddingModel + ?Sized> ChunkIndexPipeline<E> {
    pub fn new(
        embedder: Arc<E>,
        index: HnswIndex,
        metadata: ChunkMetadata,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            index: RwLock::new(index),
            metadata,
            config,
        }
    }

    /// Open (or create) the index and metadata under `index_dir`, sized for
    /// the embedder's dimension.
    ///
    /// An index built by a different embedder is discarded, since its vectors
    /// live in another space; the caller re-indexes into the empty index.
    pub fn open(
        embedder: Arc<E>,
        index_dir: impl AsRef<Path>,
        config: PipelineConfig,
    ) -> Result<Self, VectorError> {
        let index_dir = index_dir.as_ref();
        std::fs::create_dir_all(index_dir)?;

        let info = embedder.info();
        let embedder_id = format!("{}/{}", info.name, info.dimension);
        let metadata = ChunkMetadata::open(index_dir.join(METADATA_DIR))?;
        match metadata.embedder_id()? {
            Some(recorded) if recorded == embedder_id => {}
            Some(recorded) => {
                warn!(
                    %recorded,
                    current = %embedder_id,
                    "Index built by another embedder, discarding"
                );
                let index_file = index_dir.join(INDEX_FILE_NAME);
                if index_file.exists() {
                    std::fs::remove_file(&index_file)?;
                }
                metadata.clear()?;
                metadata.set_embedder_id(&embedder_id)?;
            }
            None => metadata.set_embedder_id(&embedder_id)?,
        }

        let index = HnswIndex::open_or_create(HnswConfig::new(info.dimension, index_dir))?;

        Ok(Self::new(embedder, index, metadata, config))
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, HnswIndex>, VectorError> {
        self.index
            .read()
            .map_err(|e| VectorError::Index(format!("Failed to acquire read lock: {}", e)))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, HnswIndex>, VectorError> {
        self.index
            .write()
            .map_err(|e| VectorError::Index(format!("Failed to acquire write lock: {}", e)))
    }

    /// Embed and add every chunk of `notes`, then persist the index.
    pub fn index_notes(&self, notes: &[NoteChunks]) -> Result<IndexingStats, VectorError> {
        let mut stats = IndexingStats::default();

        // (note, chunk index, text) in a flat list so batches can span notes
        let mut pending: Vec<(&NoteChunks, usize, &str)> = Vec::new();
        for note in notes {
            stats.notes_processed += 1;
            if note.chunks.is_empty() {
                debug!(note = %note.note_path, "No paragraphs, skipping");
                stats.notes_skipped += 1;
                continue;
            }
            for (i, text) in note.chunks.iter().enumerate() {
                pending.push((note, i, text.as_str()));
            }
        }

        if pending.is_empty() {
            return Ok(stats);
        }

        info!(notes = notes.len(), chunks = pending.len(), "Indexing note chunks");

        let mut failed: BTreeSet<&str> = BTreeSet::new();
        for batch in pending.chunks(self.config.batch_size.max(1)) {
            match self.process_batch(batch) {
                Ok(added) => stats.chunks_added += added,
                Err(e) => {
                    error!(error = %e, "Batch indexing failed");
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                    stats.errors += batch.len();
                    failed.extend(batch.iter().map(|(note, _, _)| note.note_path.as_str()));
                }
            }
        }

        // a note is stored whole or not at all, so a later sync sees it as missing
        for note_path in failed {
            let partial = self.metadata.find_by_note(note_path)?;
            let dropped = self.remove_entries(&partial)?;
            stats.chunks_added = stats.chunks_added.saturating_sub(dropped);
            warn!(note = %note_path, dropped, "Dropped partially indexed note");
        }

        self.read_index()?.save()?;

        info!(
            notes = stats.notes_processed,
            added = stats.chunks_added,
            skipped = stats.notes_skipped,
            errors = stats.errors,
            "Chunk indexing complete"
        );
        Ok(stats)
    }

    fn process_batch(&self, batch: &[(&NoteChunks, usize, &str)]) -> Result<usize, VectorError> {
        let texts: Vec<&str> = batch.iter().map(|(_, _, text)| *text).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        let first_id = self.metadata.next_vector_id()?;
        let now = Utc::now().timestamp_millis();

        let entries: Vec<ChunkEntry> = batch
            .iter()
            .enumerate()
            .map(|(offset, (note, chunk_index, text))| {
                ChunkEntry::new(
                    first_id + offset as u64,
                    note.note_path.clone(),
                    *chunk_index,
                    *text,
                    note.content_hash.clone(),
                    now,
                )
            })
            .collect();

        let vectors: Vec<(u64, Embedding)> = entries
            .iter()
            .map(|entry| entry.vector_id)
            .zip(embeddings)
            .collect();
        self.write_index()?.add_batch(&vectors)?;
        self.metadata.put_batch(&entries)?;

        Ok(entries.len())
    }

    fn remove_entries(&self, entries: &[ChunkEntry]) -> Result<usize, VectorError> {
        let mut index = self.write_index()?;
        for entry in entries {
            if !index.remove(entry.vector_id)? {
                warn!(vector_id = entry.vector_id, "Vector missing from index");
            }
            self.metadata.delete(entry.vector_id)?;
        }
        Ok(entries.len())
    }

    /// Drop every chunk of a note. Returns the number of chunks removed.
    pub fn remove_note(&self, note_path: &str) -> Result<usize, VectorError> {
        let entries = self.metadata.find_by_note(note_path)?;
        if entries.is_empty() {
            return Ok(0);
        }

        let removed = self.remove_entries(&entries)?;
        self.read_index()?.save()?;

        debug!(note = %note_path, removed, "Removed note from index");
        Ok(removed)
    }

    /// Swap a note's chunks for a fresh set.
    pub fn replace_note(&self, note: &NoteChunks) -> Result<IndexingStats, VectorError> {
        self.remove_note(&note.note_path)?;
        self.index_notes(std::slice::from_ref(note))
    }

    /// Clear everything and index `notes` from scratch.
    pub fn rebuild(&self, notes: &[NoteChunks]) -> Result<IndexingStats, VectorError> {
        info!(notes = notes.len(), "Starting full index rebuild");
        self.write_index()?.clear()?;
        self.metadata.clear()?;
        self.index_notes(notes)
    }

    /// Remove chunks whose note is absent from `current` (path -> content
    /// hash) or whose recorded hash differs. Returns the affected note paths.
    pub fn prune_stale(
        &self,
        current: &BTreeMap<String, String>,
    ) -> Result<BTreeSet<String>, VectorError> {
        let stale: Vec<ChunkEntry> = self
            .metadata
            .get_all()?
            .into_iter()
            .filter(|e| current.get(&e.note_path) != Some(&e.content_hash))
            .collect();

        let notes: BTreeSet<String> = stale.iter().map(|e| e.note_path.clone()).collect();
        if stale.is_empty() {
            return Ok(notes);
        }

        self.remove_entries(&stale)?;
        self.read_index()?.save()?;

        info!(chunks = stale.len(), notes = notes.len(), "Pruned stale chunks");
        Ok(notes)
    }

    /// Content hash per indexed note.
    pub fn indexed_notes(&self) -> Result<BTreeMap<String, String>, VectorError> {
        self.metadata.note_hashes()
    }

    /// Embed `query` and return the `k` closest chunks, best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ChunkHit>, VectorError> {
        let embedding = self.embedder.embed(query)?;
        let results = self.read_index()?.search(&embedding, k)?;

        let mut hits = Vec::with_capacity(results.len());
        for result in results {
            match self.metadata.get(result.vector_id)? {
                Some(entry) => hits.push(ChunkHit {
                    entry,
                    score: result.score,
                }),
                None => warn!(vector_id = result.vector_id, "No metadata for vector"),
            }
        }
        Ok(hits)
    }

    pub fn chunk_count(&self) -> Result<usize, VectorError> {
        self.metadata.count()
    }

    pub fn is_empty(&self) -> Result<bool, VectorError> {
        Ok(self.chunk_count()? == 0)
    }

    pub fn stats(&self) -> Result<IndexStats, VectorError> {
        Ok(self.read_index()?.stats())
    }
}
