//! Keeps the chunk index in step with the vault's notes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};
use vault_embeddings::EmbeddingModel;
use vault_vector::{
    ChunkHit, ChunkIndexPipeline, IndexStats, IndexingStats, NoteChunks, PipelineConfig,
};

use crate::chunk::{content_hash, note_chunks};
use crate::error::OpsError;
use crate::vault::{NotePath, Vault};

/// Difference between the vault on disk and the index.
#[derive(Debug, Default, Clone)]
pub struct SyncPlan {
    /// Current content hash of every readable note
    pub current: BTreeMap<String, String>,
    /// Indexed notes that are gone or whose content changed
    pub stale: BTreeSet<String>,
    /// Notes that need (re)indexing: never indexed, or changed
    pub missing: Vec<NotePath>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

/// Result of applying a [`SyncPlan`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Notes whose chunks were dropped
    pub removed: usize,
    /// Notes whose chunks were added
    pub indexed: usize,
}

/// Vault plus its chunk index.
///
/// Index writes are serialized so that concurrent first writes cannot both
/// bulk-index an empty index.
pub struct VaultIndexer {
    vault: Vault,
    pipeline: ChunkIndexPipeline<dyn EmbeddingModel>,
    writes: Mutex<()>,
}

impl VaultIndexer {
    pub fn open(
        vault: Vault,
        embedder: Arc<dyn EmbeddingModel>,
        index_dir: impl AsRef<Path>,
    ) -> Result<Self, OpsError> {
        let pipeline = ChunkIndexPipeline::open(embedder, index_dir, PipelineConfig::default())?;
        Ok(Self {
            vault,
            pipeline,
            writes: Mutex::new(()),
        })
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Read every note, skipping (with a warning) files that are not UTF-8.
    fn read_notes(&self, notes: &[NotePath]) -> Vec<(NotePath, String)> {
        notes
            .iter()
            .filter_map(|note| match self.vault.read(note) {
                Ok(text) => Some((note.clone(), text)),
                Err(e) => {
                    warn!(note = %note.rel, error = %e, "Skipping unreadable note");
                    None
                }
            })
            .collect()
    }

    fn chunks_for(&self, notes: &[NotePath]) -> Vec<NoteChunks> {
        self.read_notes(notes)
            .iter()
            .map(|(note, text)| note_chunks(&note.rel, text))
            .collect()
    }

    /// Bulk-index the vault when the index holds nothing yet.
    pub fn ensure_index(&self) -> Result<IndexingStats, OpsError> {
        let _writes = self.write_lock();
        self.fill_empty_index()
    }

    fn fill_empty_index(&self) -> Result<IndexingStats, OpsError> {
        if !self.pipeline.is_empty()? {
            return Ok(IndexingStats::default());
        }
        let notes = self.vault.list_notes()?;
        if notes.is_empty() {
            return Ok(IndexingStats::default());
        }
        info!(notes = notes.len(), "Index empty, indexing vault");
        Ok(self.pipeline.index_notes(&self.chunks_for(&notes))?)
    }

    /// Replace the indexed chunks of one note with its current content.
    pub fn index_note(&self, note: &NotePath, text: &str) -> Result<IndexingStats, OpsError> {
        let _writes = self.write_lock();
        Ok(self.pipeline.replace_note(&note_chunks(&note.rel, text))?)
    }

    /// Index a note that was just written. An empty index is filled from the
    /// whole vault instead, which already covers this note.
    pub fn refresh_note(&self, note: &NotePath, text: &str) -> Result<IndexingStats, OpsError> {
        let _writes = self.write_lock();
        let bulk = self.fill_empty_index()?;
        if bulk.notes_processed > 0 {
            return Ok(bulk);
        }
        Ok(self.pipeline.replace_note(&note_chunks(&note.rel, text))?)
    }

    /// Drop a note's chunks. Returns how many were removed.
    pub fn remove_note(&self, rel: &str) -> Result<usize, OpsError> {
        let _writes = self.write_lock();
        Ok(self.pipeline.remove_note(rel)?)
    }

    /// Clear the index and embed every note again.
    pub fn rebuild(&self) -> Result<IndexingStats, OpsError> {
        let _writes = self.write_lock();
        let notes = self.vault.list_notes()?;
        Ok(self.pipeline.rebuild(&self.chunks_for(&notes))?)
    }

    /// Compare note hashes on disk with the hashes recorded in the index.
    pub fn sync_plan(&self) -> Result<SyncPlan, OpsError> {
        let indexed = self.pipeline.indexed_notes()?;
        let mut plan = SyncPlan::default();

        for (note, text) in self.read_notes(&self.vault.list_notes()?) {
            let hash = content_hash(&text);
            match indexed.get(&note.rel) {
                Some(recorded) if *recorded == hash => {}
                Some(_) => {
                    plan.stale.insert(note.rel.clone());
                    plan.missing.push(note.clone());
                }
                // Notes without paragraphs never get chunks; leave them be
                None if note_chunks(&note.rel, &text).chunks.is_empty() => {}
                None => plan.missing.push(note.clone()),
            }
            plan.current.insert(note.rel, hash);
        }

        for rel in indexed.keys() {
            if !plan.current.contains_key(rel) {
                plan.stale.insert(rel.clone());
            }
        }
        Ok(plan)
    }

    /// Prune stale chunks and index what the plan lists as missing.
    pub fn apply_sync(&self, plan: &SyncPlan) -> Result<SyncOutcome, OpsError> {
        let _writes = self.write_lock();
        let removed = self.pipeline.prune_stale(&plan.current)?.len();
        let stats = self.pipeline.index_notes(&self.chunks_for(&plan.missing))?;
        let outcome = SyncOutcome {
            removed,
            indexed: stats.notes_processed - stats.notes_skipped,
        };
        info!(removed = outcome.removed, indexed = outcome.indexed, "Synced index");
        Ok(outcome)
    }

    /// Top-`k` chunks for `query`, best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ChunkHit>, OpsError> {
        Ok(self.pipeline.search(query, k)?)
    }

    pub fn chunk_count(&self) -> Result<usize, OpsError> {
        Ok(self.pipeline.chunk_count()?)
    }

    /// Indexed note paths.
    pub fn indexed_notes(&self) -> Result<BTreeSet<String>, OpsError> {
        Ok(self.pipeline.indexed_notes()?.into_keys().collect())
    }

    pub fn stats(&self) -> Result<IndexStats, OpsError> {
        Ok(self.pipeline.stats()?)
    }
}
