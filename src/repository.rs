//! backend-engine consumer contracts
//!
//! narrow interfaces the core depends on (interface segregation per
//! collaborator): `Send + Sync`, `async fn` methods, a dedicated error enum
//! per trait family.
//!
//! the core never implements these against a real backend; a caller's
//! dependency-injection root binds them to the actual in-memory engine.

use std::collections::BTreeMap;
use thiserror::Error;

/// errors raised by a repository adapter
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("backend request failed: {0}")]
    Backend(#[source] anyhow::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// a field definition as the backend's index-create command understands it
#[derive(Debug, Clone)]
pub struct IndexFieldDef {
    pub name: String,
    pub kind: IndexFieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFieldKind {
    Tag,
    Numeric,
    Text,
    Vector { dim: u32 },
}

/// a secondary-index definition to create in the backend
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: String,
    pub key_prefix: String,
    pub fields: Vec<IndexFieldDef>,
}

/// hash (document) storage operations
pub trait HashRepository: Send + Sync {
    /// overwrite every field of a hash key
    fn set_all(
        &self,
        key: &str,
        fields: BTreeMap<String, Vec<u8>>,
    ) -> impl std::future::Future<Output = RepoResult<()>> + Send;

    /// write many hash keys in a single pipelined round-trip
    fn set_many_pipelined(
        &self,
        entries: Vec<(String, BTreeMap<String, Vec<u8>>)>,
    ) -> impl std::future::Future<Output = RepoResult<()>> + Send;

    /// fetch every field of a hash key
    fn get_all(&self, key: &str) -> impl std::future::Future<Output = RepoResult<Option<BTreeMap<String, Vec<u8>>>>> + Send;

    fn delete(&self, key: &str) -> impl std::future::Future<Output = RepoResult<bool>> + Send;

    fn exists(&self, key: &str) -> impl std::future::Future<Output = RepoResult<bool>> + Send;

    /// scan all keys under a prefix (used for collection enumeration/debugging)
    fn scan_by_prefix(&self, prefix: &str) -> impl std::future::Future<Output = RepoResult<Vec<String>>> + Send;
}

/// secondary-index lifecycle operations
pub trait IndexRepository: Send + Sync {
    fn create(&self, def: IndexDef) -> impl std::future::Future<Output = RepoResult<()>> + Send;

    fn drop(&self, name: &str) -> impl std::future::Future<Output = RepoResult<()>> + Send;

    fn exists(&self, name: &str) -> impl std::future::Future<Output = RepoResult<bool>> + Send;

    /// whether the backend binding supports keyword (BM25) search
    fn supports_text_search(&self) -> bool;
}

/// a single row returned by the backend's KNN or BM25 query
#[derive(Debug, Clone)]
pub struct BackendRow {
    pub id: String,
    /// raw backend score: cosine/L2 distance for KNN, BM25 relevance for bm25
    pub score: f32,
    pub fields: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
    Cosine,
    L2,
}

/// a KNN query against the backend's vector index
#[derive(Debug, Clone)]
pub struct KnnQuery {
    pub index: String,
    pub vector: Vec<f32>,
    pub k: usize,
    pub filter: String,
    pub metric: VectorMetric,
    pub return_fields: Vec<String>,
    pub include_vector: bool,
    pub raw_scores: bool,
}

/// a BM25 query against the backend's text index
#[derive(Debug, Clone)]
pub struct Bm25Query {
    pub index: String,
    pub query: String,
    pub filter: String,
    pub top_k: usize,
}

/// search (KNN/BM25/list/count) operations
pub trait SearchRepository: Send + Sync {
    fn knn(&self, query: KnnQuery) -> impl std::future::Future<Output = RepoResult<Vec<BackendRow>>> + Send;

    fn bm25(&self, query: Bm25Query) -> impl std::future::Future<Output = RepoResult<Vec<BackendRow>>> + Send;

    fn list(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
        fields: Vec<String>,
    ) -> impl std::future::Future<Output = RepoResult<Vec<BackendRow>>> + Send;

    fn count(&self, index: &str, query: &str) -> impl std::future::Future<Output = RepoResult<u64>> + Send;
}

/// plain key-value operations, used by the budget tracker's persistence store
pub trait KvRepository: Send + Sync {
    fn get(&self, key: &str) -> impl std::future::Future<Output = RepoResult<Option<i64>>> + Send;

    fn set(&self, key: &str, value: i64) -> impl std::future::Future<Output = RepoResult<()>> + Send;

    fn incr_by(&self, key: &str, delta: i64) -> impl std::future::Future<Output = RepoResult<i64>> + Send;

    fn expire(&self, key: &str, ttl_seconds: u64) -> impl std::future::Future<Output = RepoResult<()>> + Send;
}

/// byte-blob key-value storage backing the content-addressed embedding
/// cache. kept distinct from `KvRepository` since the cache stores opaque
/// packed-vector bytes, not integer counters.
pub trait CacheRepository: Send + Sync {
    fn get_bytes(&self, key: &str) -> impl std::future::Future<Output = RepoResult<Option<Vec<u8>>>> + Send;

    fn set_bytes(&self, key: &str, value: Vec<u8>) -> impl std::future::Future<Output = RepoResult<()>> + Send;
}

/// the bundle of backend capabilities `SearchService` and `IngestionService`
/// are generic over. implemented automatically for any type implementing
/// the three constituent traits — a caller's dependency-injection root binds
/// one concrete backend type to all three and passes it in once.
pub trait Backend: HashRepository + IndexRepository + SearchRepository {}

impl<T: HashRepository + IndexRepository + SearchRepository> Backend for T {}
