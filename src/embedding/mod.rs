//! the embedding decorator chain
//!
//! composition, outermost first: instruction prefix -> content-addressed
//! cache -> budget-enforcing/metric-emitting wrapper -> provider transport.
//! each layer implements the same single-text `Embedder` contract (and an
//! optional batch variant) and also carries token accounting.

mod batch;
mod budget_wrapper;
mod cache;
mod instruction;
pub mod provider;

pub use batch::BatchEmbedder;
pub use budget_wrapper::BudgetedEmbedder;
pub use cache::CachingEmbedder;
pub use instruction::{InstructionKind, InstructionPrefixEmbedder};

use thiserror::Error;

/// maximum number of texts a single batch call fans out per underlying
/// provider request
pub const API_BATCH_MAX: usize = 256;

/// errors raised anywhere in the embedding chain
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("no embedding returned from provider")]
    EmptyResponse,

    #[error("quota exceeded for provider {provider}")]
    QuotaExceeded { provider: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<EmbeddingError> for crate::error::Error {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::QuotaExceeded { provider } => crate::error::Error::QuotaExceeded { provider },
            other => crate::error::Error::EmbeddingProvider(other.to_string()),
        }
    }
}

/// an embedding vector plus its token accounting. a cache hit reports
/// `total_tokens = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// a provider that can generate embeddings for text
///
/// implementations should be cheap to clone (wrap expensive resources in
/// `Arc`).
pub trait Embedder: Send + Sync {
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<EmbeddingResult, EmbeddingError>> + Send;

    /// human-readable name for logging/metrics
    fn name(&self) -> &'static str;
}
