//! Model file caching.
//!
//! Model files come from the HuggingFace Hub and are copied into a per-repo
//! directory so later runs work offline.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default model repository on HuggingFace
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Files a BERT sentence model needs
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Where model files live on disk.
#[derive(Debug, Clone)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            repo_id: DEFAULT_MODEL_REPO.to_string(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("vault-ops")
        .join("models")
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Default cache location with a different repository.
    pub fn for_repo(repo_id: impl Into<String>) -> Self {
        Self::new(default_cache_dir(), repo_id)
    }

    /// Directory for this repository (`org/name` becomes `org_name`).
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    /// Model files not yet present in the cache.
    pub fn missing_files(&self) -> Vec<&'static str> {
        MODEL_FILES
            .iter()
            .copied()
            .filter(|f| !self.file_path(f).exists())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }
}

/// Paths to the three model files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }
}

/// Return cached model paths, downloading whatever is missing first.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let missing = cache.missing_files();

    if missing.is_empty() {
        debug!(path = ?cache.model_dir(), "Using cached model");
    } else {
        info!(repo = %cache.repo_id, files = ?missing, "Downloading model files");
        download_files(cache, &missing)?;
    }

    Ok(ModelPaths::in_dir(&cache.model_dir()))
}

fn download_files(cache: &ModelCache, files: &[&str]) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())?;

    for filename in files {
        let source_path = repo
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;

        // copy next to the destination first so a crash never leaves a partial file
        let dest_path = cache.file_path(filename);
        let tmp_path = dest_path.with_extension("part");
        std::fs::copy(&source_path, &tmp_path)?;
        std::fs::rename(&tmp_path, &dest_path)?;
        debug!(file = filename, dest = ?dest_path, "Cached model file");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_default() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("vault-ops"));
        assert_eq!(cache.repo_id, DEFAULT_MODEL_REPO);
    }

    #[test]
    fn test_model_dir_flattens_repo() {
        let cache = ModelCache::new("/tmp/models", "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(
            cache.model_dir(),
            PathBuf::from("/tmp/models/sentence-transformers_all-MiniLM-L6-v2")
        );
    }

    #[test]
    fn test_missing_files_shrinks() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert_eq!(cache.missing_files().len(), MODEL_FILES.len());
        assert!(!cache.is_cached());

        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(cache.file_path("config.json"), "{}").unwrap();
        assert_eq!(
            cache.missing_files(),
            vec!["tokenizer.json", "model.safetensors"]
        );
    }
}
