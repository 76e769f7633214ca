//! Chunk metadata storage.
//!
//! Maps vector ids (u64, big-endian keys) to the note chunk they embed.
//! Stored in RocksDB so ids, paths and hashes survive restarts together.

use std::collections::BTreeMap;
use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family name for chunk metadata
pub const CF_CHUNK_META: &str = "chunk_meta";

/// Column family for facts about the index as a whole
pub const CF_INDEX_INFO: &str = "index_info";

const EMBEDDER_KEY: &[u8] = b"embedder";

/// One embedded paragraph of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Key in the HNSW index
    pub vector_id: u64,
    /// Vault-relative note path using `/` separators
    pub note_path: String,
    /// Position of the paragraph within the note
    pub chunk_index: usize,
    /// Paragraph text, returned as retrieval context
    pub text: String,
    /// Hex SHA-256 of the whole note when it was indexed
    pub content_hash: String,
    /// When the chunk was indexed (ms since epoch)
    pub indexed_at: i64,
}

impl ChunkEntry {
    pub fn new(
        vector_id: u64,
        note_path: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        content_hash: impl Into<String>,
        indexed_at: i64,
    ) -> Self {
        Self {
            vector_id,
            note_path: note_path.into(),
            chunk_index,
            text: text.into(),
            content_hash: content_hash.into(),
            indexed_at,
        }
    }
}

/// Chunk metadata store using RocksDB.
pub struct ChunkMetadata {
    db: DB,
}

impl ChunkMetadata {
    /// Open or create the store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_CHUNK_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDEX_INFO, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        info!(path = ?path, "Opened chunk metadata storage");
        Ok(Self { db })
    }

    fn cf(&self) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(CF_CHUNK_META)
            .ok_or_else(|| VectorError::Index(format!("column family {} missing", CF_CHUNK_META)))
    }

    fn info_cf(&self) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(CF_INDEX_INFO)
            .ok_or_else(|| VectorError::Index(format!("column family {} missing", CF_INDEX_INFO)))
    }

    /// Embedder (`name/dimension`) that produced the stored vectors.
    pub fn embedder_id(&self) -> Result<Option<String>, VectorError> {
        match self.db.get_cf(self.info_cf()?, EMBEDDER_KEY)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| VectorError::Metadata(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn set_embedder_id(&self, id: &str) -> Result<(), VectorError> {
        self.db.put_cf(self.info_cf()?, EMBEDDER_KEY, id.as_bytes())?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<ChunkEntry, VectorError> {
        serde_json::from_slice(bytes).map_err(|e| VectorError::Metadata(e.to_string()))
    }

    pub fn put(&self, entry: &ChunkEntry) -> Result<(), VectorError> {
        let value =
            serde_json::to_vec(entry).map_err(|e| VectorError::Metadata(e.to_string()))?;
        self.db
            .put_cf(self.cf()?, entry.vector_id.to_be_bytes(), value)?;
        debug!(vector_id = entry.vector_id, note = %entry.note_path, "Stored chunk metadata");
        Ok(())
    }

    /// Store several entries atomically.
    pub fn put_batch(&self, entries: &[ChunkEntry]) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for entry in entries {
            let value = serde_json::to_vec(entry)
                .map_err(|e| VectorError::Metadata(e.to_string()))?;
            batch.put_cf(cf, entry.vector_id.to_be_bytes(), value);
        }
        self.db.write(batch)?;
        Ok(())
    }

    pub fn get(&self, vector_id: u64) -> Result<Option<ChunkEntry>, VectorError> {
        match self.db.get_cf(self.cf()?, vector_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, vector_id: u64) -> Result<(), VectorError> {
        self.db.delete_cf(self.cf()?, vector_id.to_be_bytes())?;
        Ok(())
    }

    /// All entries, in vector id order.
    pub fn get_all(&self) -> Result<Vec<ChunkEntry>, VectorError> {
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(Self::decode(&value)?);
        }
        Ok(entries)
    }

    /// Chunks of one note, ordered by chunk index.
    pub fn find_by_note(&self, note_path: &str) -> Result<Vec<ChunkEntry>, VectorError> {
        let mut entries: Vec<ChunkEntry> = self
            .get_all()?
            .into_iter()
            .filter(|e| e.note_path == note_path)
            .collect();
        entries.sort_by_key(|e| e.chunk_index);
        Ok(entries)
    }

    /// Content hash recorded for every indexed note.
    pub fn note_hashes(&self) -> Result<BTreeMap<String, String>, VectorError> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|e| (e.note_path, e.content_hash))
            .collect())
    }

    pub fn count(&self) -> Result<usize, VectorError> {
        Ok(self
            .db
            .iterator_cf(self.cf()?, IteratorMode::Start)
            .count())
    }

    /// Remove every entry; used by full rebuilds.
    pub fn clear(&self) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
        }
        self.db.write(batch)?;
        debug!("Cleared chunk metadata");
        Ok(())
    }

    /// One past the highest id in use (ids start at 1).
    pub fn next_vector_id(&self) -> Result<u64, VectorError> {
        match self.db.iterator_cf(self.cf()?, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    VectorError::Metadata(format!("bad vector id key of {} bytes", key.len()))
                })?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: u64, note: &str, chunk: usize) -> ChunkEntry {
        ChunkEntry::new(id, note, chunk, format!("paragraph {}", chunk), "abc123", 0)
    }

    #[test]
    fn test_put_and_get() {
        let temp = TempDir::new().unwrap();
        let meta = ChunkMetadata::open(temp.path()).unwrap();

        meta.put(&entry(1, "daily/2024-01-15.md", 0)).unwrap();

        let retrieved = meta.get(1).unwrap().unwrap();
        assert_eq!(retrieved.note_path, "daily/2024-01-15.md");
        assert_eq!(retrieved.text, "paragraph 0");
        assert!(meta.get(2).unwrap().is_none());
    }

    #[test]
    fn test_find_by_note_sorted() {
        let temp = TempDir::new().unwrap();
        let meta = ChunkMetadata::open(temp.path()).unwrap();

        meta.put_batch(&[
            entry(1, "a.md", 1),
            entry(2, "b.md", 0),
            entry(3, "a.md", 0),
        ])
        .unwrap();

        let chunks = meta.find_by_note("a.md").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].vector_id, 3);
        assert_eq!(chunks[1].vector_id, 1);
        assert!(meta.find_by_note("missing.md").unwrap().is_empty());
    }

    #[test]
    fn test_next_vector_id() {
        let temp = TempDir::new().unwrap();
        let meta = ChunkMetadata::open(temp.path()).unwrap();

        assert_eq!(meta.next_vector_id().unwrap(), 1);
        meta.put(&entry(42, "a.md", 0)).unwrap();
        meta.put(&entry(7, "a.md", 1)).unwrap();
        assert_eq!(meta.next_vector_id().unwrap(), 43);
    }

    #[test]
    fn test_note_hashes() {
        let temp = TempDir::new().unwrap();
        let meta = ChunkMetadata::open(temp.path()).unwrap();
        meta.put(&ChunkEntry::new(1, "a.md", 0, "x", "h1", 0)).unwrap();
        meta.put(&ChunkEntry::new(2, "a.md", 1, "y", "h1", 0)).unwrap();
        meta.put(&ChunkEntry::new(3, "b.md", 0, "z", "h2", 0)).unwrap();

        let hashes = meta.note_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes["b.md"], "h2");
    }

    #[test]
    fn test_delete_count_clear() {
        let temp = TempDir::new().unwrap();
        let meta = ChunkMetadata::open(temp.path()).unwrap();

        for i in 1..=5 {
            meta.put(&entry(i, "notes.md", i as usize)).unwrap();
        }
        assert_eq!(meta.count().unwrap(), 5);

        meta.delete(3).unwrap();
        assert_eq!(meta.count().unwrap(), 4);

        meta.clear().unwrap();
        assert_eq!(meta.count().unwrap(), 0);
        assert_eq!(meta.next_vector_id().unwrap(), 1);
    }

    #[test]
    fn test_embedder_id_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let meta = ChunkMetadata::open(temp.path()).unwrap();
            assert_eq!(meta.embedder_id().unwrap(), None);
            meta.set_embedder_id("all-MiniLM-L6-v2/384").unwrap();
            meta.put(&entry(1, "a.md", 0)).unwrap();
            meta.clear().unwrap();
        }
        let meta = ChunkMetadata::open(temp.path()).unwrap();
        assert_eq!(
            meta.embedder_id().unwrap().as_deref(),
            Some("all-MiniLM-L6-v2/384")
        );
        assert_eq!(meta.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let temp = TempDir::new().unwrap();
        {
            let meta = ChunkMetadata::open(temp.path()).unwrap();
            meta.put(&entry(9, "kept.md", 0)).unwrap();
        }
        let meta = ChunkMetadata::open(temp.path()).unwrap();
        assert_eq!(meta.get(9).unwrap().unwrap().note_path, "kept.md");
    }
}
