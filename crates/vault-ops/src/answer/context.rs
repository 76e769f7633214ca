//! Answerer that hands the retrieved context back unchanged.

use async_trait::async_trait;

use super::{format_context, AnswerError, Answerer, RetrievedChunk};

/// Returns the question and its context with a simulated answer line.
///
/// The calling agent does its own reasoning over the context, so no model
/// call is made.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAnswerer;

#[async_trait]
impl Answerer for ContextAnswerer {
    async fn answer(
        &self,
        question: &str,
        context: &[RetrievedChunk],
    ) -> Result<String, AnswerError> {
        Ok(format!(
            "QUESTION:\n{}\n\nCONTEXT:\n{}\n\nAnswer (simulated): ...\n",
            question,
            format_context(context)
        ))
    }
}
