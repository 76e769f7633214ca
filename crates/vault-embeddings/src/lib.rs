//! # vault-embeddings
//!
//! Sentence embeddings for note chunks and questions.
//!
//! - all-MiniLM-L6-v2 through Candle (384 dimensions, local inference)
//! - Model files fetched from the HuggingFace Hub once, then cached
//! - Lazy loading so commands that never embed never pay for the model
//! - `HashEmbedder` for tests and offline runs

pub mod cache;
pub mod candle;
pub mod error;
pub mod hash;
pub mod model;

pub use crate::candle::{CandleEmbedder, LazyCandleEmbedder, EMBEDDING_DIM};
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use hash::HashEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
