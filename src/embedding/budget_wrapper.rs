use super::{EmbeddingError, EmbeddingResult};
use crate::budget::BudgetTracker;
use crate::embedding::Embedder;
use crate::error::Error;
use crate::repository::KvRepository;
use std::sync::Arc;

/// budget-enforcing, metric-emitting layer of the embedding chain.
///
/// consults the budget before delegating; on reject-policy exceed, fails
/// with `QuotaExceeded` without ever calling the inner embedder. after a
/// successful call, records consumed tokens into the budget and emits a
/// metrics event.
pub struct BudgetedEmbedder<E, S> {
    inner: E,
    budget: Arc<BudgetTracker<S>>,
}

impl<E, S> BudgetedEmbedder<E, S> {
    pub fn new(inner: E, budget: Arc<BudgetTracker<S>>) -> Self {
        Self { inner, budget }
    }
}

impl<E: Embedder, S: KvRepository + Clone + Send + Sync + 'static> Embedder for BudgetedEmbedder<E, S> {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        self.budget.check().map_err(|e| match e {
            Error::QuotaExceeded { provider } => EmbeddingError::QuotaExceeded { provider },
            other => EmbeddingError::Other(other.into()),
        })?;

        let result = self.inner.embed(text).await?;

        self.budget.record(result.total_tokens);
        tracing::info!(
            provider = self.inner.name(),
            total_tokens = result.total_tokens,
            prompt_tokens = result.prompt_tokens,
            "embedding call completed"
        );

        Ok(result)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
