//! Candle-based embedding implementation.
//!
//! Runs all-MiniLM-L6-v2 on the CPU and mean-pools the token states into one
//! 384-dimensional vector per text.

use std::path::Path;
use std::sync::OnceLock;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length; longer paragraphs are truncated
pub const MAX_SEQ_LENGTH: usize = 256;

fn minilm_info() -> ModelInfo {
    ModelInfo {
        name: "all-MiniLM-L6-v2".to_string(),
        dimension: EMBEDDING_DIM,
        max_sequence_length: MAX_SEQ_LENGTH,
    }
}

/// Sentence embedder backed by a Candle BERT model.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load from the cache, downloading files on first use.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::load_from_paths(&paths.config, &paths.tokenizer, &paths.weights)
    }

    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    pub fn load_from_paths(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        info!(weights = ?weights_path, "Loading embedding model");

        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelConfig(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // SAFETY: the weights file is owned by our cache and not modified while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(dim = EMBEDDING_DIM, max_seq = MAX_SEQ_LENGTH, "Model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: minilm_info(),
        })
    }

    /// Tokenize and pad a batch to a common length (capped at MAX_SEQ_LENGTH).
    fn encode_padded(&self, texts: &[&str]) -> Result<(Tensor, Tensor), EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids = Vec::with_capacity(texts.len() * max_len);
        let mut mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            ids.extend_from_slice(&encoding.get_ids()[..len]);
            mask.extend_from_slice(&encoding.get_attention_mask()[..len]);
            ids.extend(std::iter::repeat(0).take(max_len - len));
            mask.extend(std::iter::repeat(0).take(max_len - len));
        }

        let ids = Tensor::from_vec(ids, (texts.len(), max_len), &self.device)?;
        let mask = Tensor::from_vec(mask, (texts.len(), max_len), &self.device)?;
        Ok((ids, mask))
    }

    /// Average token states, ignoring padding.
    fn mean_pooling(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask
            .unsqueeze(2)?
            .broadcast_as(hidden.shape())?
            .to_dtype(DType::F32)?;

        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(summed.broadcast_div(&counts)?)
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidInput("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), "Embedding batch");

        let (input_ids, attention_mask) = self.encode_padded(texts)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled: Vec<Vec<f32>> = Self::mean_pooling(&hidden, &attention_mask)?.to_vec2()?;

        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}

/// Loads the Candle model on the first embedding call.
///
/// A failed load is remembered; later calls return the same error instead of
/// retrying the download.
pub struct LazyCandleEmbedder {
    cache: ModelCache,
    info: ModelInfo,
    inner: OnceLock<Result<CandleEmbedder, String>>,
}

impl LazyCandleEmbedder {
    pub fn new(cache: ModelCache) -> Self {
        Self {
            cache,
            info: minilm_info(),
            inner: OnceLock::new(),
        }
    }

    /// Whether the model has been loaded (successfully or not).
    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    fn model(&self) -> Result<&CandleEmbedder, EmbeddingError> {
        let loaded = self.inner.get_or_init(|| {
            CandleEmbedder::load(&self.cache).map_err(|e| {
                warn!(error = %e, repo = %self.cache.repo_id, "Embedding model failed to load");
                e.to_string()
            })
        });
        loaded
            .as_ref()
            .map_err(|msg| EmbeddingError::Unavailable(msg.clone()))
    }
}

impl EmbeddingModel for LazyCandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.model()?.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.model()?.embed_batch(texts)
    }
}
