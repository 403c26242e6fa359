//! unified error type for the search/ingestion core
//!
//! every layer (codec, filter compiler, search service, ingestion service,
//! budget tracker) returns this enum so callers can pattern-match on the
//! sentinel kinds regardless of which layer raised them.

use thiserror::Error;

/// errors surfaced by the core to its caller
#[derive(Debug, Error)]
pub enum Error {
    #[error("collection or document not found: {0}")]
    NotFound(String),

    #[error("collection already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimMismatch { expected: u32, actual: u32 },

    #[error("collection type mismatch: {0}")]
    CollectionTypeMismatch(String),

    #[error("geo query invalid: {0}")]
    GeoQueryInvalid(String),

    #[error("keyword search not supported by backend")]
    KeywordNotSupported,

    #[error("quota exceeded for provider {provider}")]
    QuotaExceeded { provider: String },

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("repository error: {0}")]
    Repository(#[from] crate::repository::RepositoryError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
