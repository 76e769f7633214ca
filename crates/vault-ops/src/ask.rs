//! Retrieval-augmented answers over the vault.

use std::sync::Arc;

use tracing::{debug, info};

use crate::answer::{Answerer, RetrievedChunk};
use crate::error::OpsError;
use crate::indexer::VaultIndexer;

/// Reply when the vault has nothing embedded to search.
pub const NO_CONTENT_REPLY: &str = "No indexed notes to answer from.";

/// Most paragraphs a single question retrieves; larger `k` is capped.
pub const MAX_TOP_K: usize = 100;

/// The `k` paragraphs most similar to `question`, best first.
///
/// Indexes the vault first if the index is empty. Blocks on embedding and
/// index I/O.
pub fn retrieve(
    indexer: &VaultIndexer,
    question: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>, OpsError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(OpsError::InvalidInput("question text is required".to_string()));
    }
    if k == 0 {
        return Err(OpsError::InvalidInput("k must be at least 1".to_string()));
    }

    let indexed = indexer.ensure_index()?;
    if indexed.chunks_added > 0 {
        info!(chunks = indexed.chunks_added, "Built index before answering");
    }

    Ok(indexer
        .search(question, k.min(MAX_TOP_K))?
        .into_iter()
        .map(RetrievedChunk::from)
        .collect())
}

/// Answer `question` from the `k` most similar paragraphs in the vault.
pub async fn ask(
    indexer: Arc<VaultIndexer>,
    answerer: &dyn Answerer,
    question: &str,
    k: usize,
) -> Result<String, OpsError> {
    let question = question.trim().to_string();
    let context = {
        let question = question.clone();
        tokio::task::spawn_blocking(move || retrieve(&indexer, &question, k)).await??
    };

    if context.is_empty() {
        return Ok(NO_CONTENT_REPLY.to_string());
    }

    debug!(k, retrieved = context.len(), "Answering question");
    Ok(answerer.answer(&question, &context).await?)
}
