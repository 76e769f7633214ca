//! Turning retrieved paragraphs into an answer.
//!
//! [`ContextAnswerer`] returns the question and retrieved context with a
//! placeholder answer, which is what an agent usually wants to reason over.
//! [`ApiAnswerer`] sends the same material to a chat model.

mod api;
mod context;

pub use api::{ApiAnswerer, ApiAnswererConfig, ApiFlavor};
pub use context::ContextAnswerer;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use vault_types::{AnswerProvider, AnswerSettings};
use vault_vector::ChunkHit;

/// Error type for answer generation.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// A paragraph handed to the answerer as context.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Vault-relative path of the source note
    pub note_path: String,
    pub text: String,
    /// Cosine similarity to the question
    pub score: f32,
}

impl From<ChunkHit> for RetrievedChunk {
    fn from(hit: ChunkHit) -> Self {
        Self {
            note_path: hit.entry.note_path,
            text: hit.entry.text,
            score: hit.score,
        }
    }
}

/// Pluggable answer backend.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Produce the reply for `question` given the retrieved chunks, best first.
    async fn answer(
        &self,
        question: &str,
        context: &[RetrievedChunk],
    ) -> Result<String, AnswerError>;
}

/// Context block shared by every backend: one `[path] text` entry per chunk.
pub(crate) fn format_context(context: &[RetrievedChunk]) -> String {
    context
        .iter()
        .map(|c| format!("[{}] {}", c.note_path, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the answerer selected by `settings`.
pub fn answerer_from_settings(settings: &AnswerSettings) -> Result<Arc<dyn Answerer>, AnswerError> {
    let config = match settings.provider {
        AnswerProvider::Context => return Ok(Arc::new(ContextAnswerer)),
        AnswerProvider::OpenAi | AnswerProvider::Anthropic => {
            let api_key = settings.resolved_api_key().ok_or_else(|| {
                AnswerError::ConfigError(format!(
                    "no API key configured for the {:?} answer provider",
                    settings.provider
                ))
            })?;
            let mut config = if settings.provider == AnswerProvider::Anthropic {
                ApiAnswererConfig::claude(api_key, settings.model.clone())
            } else {
                ApiAnswererConfig::openai(api_key, settings.model.clone())
            };
            if let Some(base_url) = &settings.api_base_url {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
            config
        }
    };
    Ok(Arc::new(ApiAnswerer::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            note_path: path.to_string(),
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_format_context() {
        let context = format_context(&[chunk("a.md", "first"), chunk("dir/b.md", "second")]);
        assert_eq!(context, "[a.md] first\n\n[dir/b.md] second");
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_default_settings_use_context_answerer() {
        assert!(answerer_from_settings(&AnswerSettings::default()).is_ok());
    }

    #[test]
    fn test_api_provider_with_key() {
        let settings = AnswerSettings {
            provider: AnswerProvider::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            api_key: Some("test-key".to_string()),
            api_base_url: Some("http://localhost:9999/v1/".to_string()),
        };
        assert!(answerer_from_settings(&settings).is_ok());
    }

    #[test]
    fn test_api_provider_without_key_fails() {
        let settings = AnswerSettings {
            provider: AnswerProvider::OpenAi,
            api_key: None,
            ..Default::default()
        };
        // The env var may be set on a developer machine.
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(matches!(
                answerer_from_settings(&settings),
                Err(AnswerError::ConfigError(_))
            ));
        }
    }
}
