//! mode-dispatching search service: semantic, keyword, hybrid, and geo
//! queries over a collection, plus the cheap "similar-to" path
//!
//! a single shared implementation behind mode dispatch, generic over the
//! backend repository bundle and the embedder.

use crate::codec;
use crate::collection_store;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::filter::{Filter, Filterable, ScoreComparison, ScoreThreshold};
use crate::filter_compiler;
use crate::fusion;
use crate::geo;
use crate::key_layout::KeyLayout;
use crate::repository::{Backend, Bm25Query, KnnQuery, VectorMetric};
use crate::schema::{self, Collection};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// the four search modes `SearchService::search` dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
    Geo,
}

const DEFAULT_TOP_K: usize = 10;
const MAX_TOP_K: usize = 500;
const MAX_LIMIT: usize = 100;

/// a search request: query text or a geo point, mode, filter, topK/limit,
/// minScore, include-vectors.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub geo_point: Option<(f64, f64)>,
    pub mode: SearchMode,
    pub filter: Expression,
    pub top_k: usize,
    pub limit: usize,
    pub min_score: Option<f64>,
    pub include_vectors: bool,
}

impl SearchRequest {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            query: None,
            geo_point: None,
            mode,
            filter: Expression::default(),
            top_k: DEFAULT_TOP_K,
            limit: DEFAULT_TOP_K,
            min_score: None,
            include_vectors: false,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_geo_point(mut self, lat: f64, lon: f64) -> Self {
        self.geo_point = Some((lat, lon));
        self
    }

    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_include_vectors(mut self, include_vectors: bool) -> Self {
        self.include_vectors = include_vectors;
        self
    }

    /// validate topK (1..=500) and limit (1..=100, capped to topK).
    fn normalize(mut self) -> Result<Self> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(Error::InvalidSchema(format!(
                "topK must be 1..={MAX_TOP_K}: {}",
                self.top_k
            )));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidSchema(format!(
                "limit must be 1..={MAX_LIMIT}: {}",
                self.limit
            )));
        }
        self.limit = self.limit.min(self.top_k);
        Ok(self)
    }
}

/// a single search hit returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub tags: BTreeMap<String, String>,
    pub numerics: BTreeMap<String, f64>,
    pub vector: Option<Vec<f32>>,
}

/// results plus the post-filter-pre-limit count: `total` is reported
/// independently of `limit`.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// an intermediate ranked candidate before the common post-filter/sort/
/// truncate tail.
struct Candidate {
    id: String,
    score: f64,
    document: crate::schema::Document,
}

impl Filterable for Candidate {
    fn score(&self) -> f64 {
        self.score
    }
}

impl Candidate {
    fn from_knn_row(row: crate::repository::BackendRow) -> Result<Self> {
        let score = 1.0 - row.score as f64;
        let document = codec::decode(&row.id, &row.fields)?;
        Ok(Self {
            id: row.id,
            score,
            document,
        })
    }

    fn from_bm25_row(row: crate::repository::BackendRow) -> Result<Self> {
        let score = row.score as f64;
        let document = codec::decode(&row.id, &row.fields)?;
        Ok(Self {
            id: row.id,
            score,
            document,
        })
    }

    fn from_geo_row(row: crate::repository::BackendRow) -> Result<Self> {
        let score = geo::l2_squared_to_meters(row.score as f64);
        let document = codec::decode(&row.id, &row.fields)?;
        Ok(Self {
            id: row.id,
            score,
            document,
        })
    }

    fn from_fused(fused: fusion::FusedResult) -> Result<Self> {
        let document = codec::decode(&fused.id, &fused.row.fields)?;
        Ok(Self {
            id: fused.id,
            score: fused.score as f64,
            document,
        })
    }

    fn into_result(self, include_vectors: bool) -> SearchResult {
        SearchResult {
            id: self.id,
            score: self.score,
            content: self.document.content,
            tags: self.document.tags,
            numerics: self.document.numerics,
            vector: if include_vectors { self.document.vector } else { None },
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Other(anyhow::anyhow!("operation cancelled")))
    } else {
        Ok(())
    }
}

fn validate_mode_compatibility(collection: &Collection, mode: SearchMode) -> Result<()> {
    match (mode, collection.is_geo()) {
        (SearchMode::Geo, false) => Err(Error::CollectionTypeMismatch(
            "geo mode requires a geo collection".to_string(),
        )),
        (SearchMode::Geo, true) => Ok(()),
        (_, true) => Err(Error::CollectionTypeMismatch(
            "non-geo modes reject geo collections".to_string(),
        )),
        (_, false) => Ok(()),
    }
}

/// `SearchService<R, E>`: generic over the backend repository bundle and
/// the embedder. stateless beyond its two collaborators — concurrent
/// searches are independent of one another.
#[derive(Clone)]
pub struct SearchService<R, E> {
    repo: R,
    embedder: E,
    prefix: String,
}

impl<R: Backend + Clone, E: Embedder> SearchService<R, E> {
    pub fn new(repo: R, embedder: E, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            embedder,
            prefix: prefix.into(),
        }
    }

    fn index_name(&self, collection_name: &str) -> String {
        KeyLayout::collection_index(&self.prefix, collection_name)
    }

    /// `search(collection, request)`: the single search entry point.
    #[tracing::instrument(skip(self, request, cancel), fields(collection = %collection_name))]
    pub async fn search(
        &self,
        collection_name: &str,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        check_cancelled(cancel)?;
        let request = request.normalize()?;
        let collection = collection_store::load_collection(&self.repo, &self.prefix, collection_name).await?;
        schema::validate_filter_against_schema(&collection, &request.filter)?;
        validate_mode_compatibility(&collection, request.mode)?;

        let mut candidates = match request.mode {
            SearchMode::Semantic => self.search_semantic(&collection, &request, cancel).await?,
            SearchMode::Keyword => self.search_keyword(&collection, &request).await?,
            SearchMode::Hybrid => self.search_hybrid(&collection, &request, cancel).await?,
            SearchMode::Geo => self.search_geo(&collection, &request).await?,
        };

        if request.mode == SearchMode::Hybrid {
            candidates.truncate(request.top_k);
        }

        Ok(self.finish(candidates, request.mode, &request))
    }

    /// `similar_to(collection, id, request)`: the cheap path. no embedding
    /// call is issued — the source document's stored vector is reused.
    #[tracing::instrument(skip(self, request, cancel), fields(collection = %collection_name, source = %source_id))]
    pub async fn similar_to(
        &self,
        collection_name: &str,
        source_id: &str,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        check_cancelled(cancel)?;
        let request = request.normalize()?;
        let collection = collection_store::load_collection(&self.repo, &self.prefix, collection_name).await?;
        if collection.is_geo() {
            return Err(Error::CollectionTypeMismatch(
                "similar-to is not supported for geo collections".to_string(),
            ));
        }
        schema::validate_filter_against_schema(&collection, &request.filter)?;

        let key = KeyLayout::document(&self.prefix, collection_name, source_id);
        let hash = self
            .repo
            .get_all(&key)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(source_id.to_string()))?;
        let source_doc = codec::decode(source_id, &hash)?;
        let vector = source_doc
            .vector
            .ok_or_else(|| Error::DocumentNotFound(format!("{source_id:?} has no stored vector")))?;

        let filter_str = filter_compiler::compile_or_wildcard(&request.filter);
        let rows = self
            .repo
            .knn(KnnQuery {
                index: self.index_name(collection_name),
                vector,
                k: request.top_k + 1,
                filter: filter_str,
                metric: VectorMetric::Cosine,
                return_fields: vec![],
                include_vector: request.include_vectors,
                raw_scores: false,
            })
            .await?;

        let mut candidates: Vec<Candidate> = rows
            .into_iter()
            .filter(|row| row.id != source_id)
            .map(Candidate::from_knn_row)
            .collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(request.top_k);

        Ok(self.finish(candidates, SearchMode::Semantic, &request))
    }

    async fn search_semantic(
        &self,
        collection: &Collection,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>> {
        let query_text = request
            .query
            .as_deref()
            .ok_or_else(|| Error::InvalidSchema("semantic search requires query text".to_string()))?;
        check_cancelled(cancel)?;
        let embedding = self.embedder.embed(query_text).await?;
        if embedding.vector.len() as u32 != collection.vector_dim {
            return Err(Error::VectorDimMismatch {
                expected: collection.vector_dim,
                actual: embedding.vector.len() as u32,
            });
        }

        let filter_str = filter_compiler::compile_or_wildcard(&request.filter);
        let rows = self
            .repo
            .knn(KnnQuery {
                index: self.index_name(&collection.name),
                vector: embedding.vector,
                k: request.top_k,
                filter: filter_str,
                metric: VectorMetric::Cosine,
                return_fields: vec![],
                include_vector: request.include_vectors,
                raw_scores: false,
            })
            .await?;

        // the backend's ANN index is approximate and may return out of
        // order; the service re-sorts by descending similarity.
        let mut candidates = rows.into_iter().map(Candidate::from_knn_row).collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }

    async fn search_keyword(&self, collection: &Collection, request: &SearchRequest) -> Result<Vec<Candidate>> {
        if !self.repo.supports_text_search() {
            return Err(Error::KeywordNotSupported);
        }
        let query_text = request
            .query
            .as_deref()
            .ok_or_else(|| Error::InvalidSchema("keyword search requires query text".to_string()))?;

        let filter_str = filter_compiler::compile_or_wildcard(&request.filter);
        let rows = self
            .repo
            .bm25(Bm25Query {
                index: self.index_name(&collection.name),
                query: query_text.to_string(),
                filter: filter_str,
                top_k: request.top_k,
            })
            .await?;

        let mut candidates = rows.into_iter().map(Candidate::from_bm25_row).collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }

    async fn search_hybrid(
        &self,
        collection: &Collection,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>> {
        if !self.repo.supports_text_search() {
            return Err(Error::KeywordNotSupported);
        }
        let query_text = request
            .query
            .as_deref()
            .ok_or_else(|| Error::InvalidSchema("hybrid search requires query text".to_string()))?;
        check_cancelled(cancel)?;

        let embedding = self.embedder.embed(query_text).await?;
        let filter_str = filter_compiler::compile_or_wildcard(&request.filter);

        // KNN and BM25 could run concurrently; RRF is commutative so
        // sequential execution here is observationally identical.
        let knn_rows = self
            .repo
            .knn(KnnQuery {
                index: self.index_name(&collection.name),
                vector: embedding.vector,
                k: request.top_k,
                filter: filter_str.clone(),
                metric: VectorMetric::Cosine,
                return_fields: vec![],
                include_vector: request.include_vectors,
                raw_scores: false,
            })
            .await?;
        let bm25_rows = self
            .repo
            .bm25(Bm25Query {
                index: self.index_name(&collection.name),
                query: query_text.to_string(),
                filter: filter_str,
                top_k: request.top_k,
            })
            .await?;

        let fused = fusion::fuse(knn_rows, bm25_rows);
        let mut candidates = fused.into_iter().map(Candidate::from_fused).collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }

    async fn search_geo(&self, collection: &Collection, request: &SearchRequest) -> Result<Vec<Candidate>> {
        let (lat, lon) = request
            .geo_point
            .ok_or_else(|| Error::GeoQueryInvalid("geo search requires a query point".to_string()))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::GeoQueryInvalid(format!(
                "query point out of range: ({lat}, {lon})"
            )));
        }

        let vector = geo::lat_lon_to_unit_ecef(lat, lon).to_vec();
        let filter_str = filter_compiler::compile_or_wildcard(&request.filter);
        let rows = self
            .repo
            .knn(KnnQuery {
                index: self.index_name(&collection.name),
                vector,
                k: request.top_k,
                filter: filter_str,
                metric: VectorMetric::L2,
                return_fields: vec![],
                include_vector: request.include_vectors,
                raw_scores: true,
            })
            .await?;

        let mut candidates = rows.into_iter().map(Candidate::from_geo_row).collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
        Ok(candidates)
    }

    /// shared post-filter/truncate tail: apply minScore (`>=` for text
    /// modes, `<=` for geo), compute `total` on the post-filtered list, then
    /// truncate to `limit`.
    fn finish(&self, candidates: Vec<Candidate>, mode: SearchMode, request: &SearchRequest) -> SearchResponse {
        let filtered: Vec<Candidate> = match request.min_score {
            Some(threshold) => {
                let comparison = if mode == SearchMode::Geo {
                    ScoreComparison::AtMost
                } else {
                    ScoreComparison::AtLeast
                };
                let score_filter = ScoreThreshold::new(threshold, comparison);
                candidates.into_iter().filter(|c| score_filter.matches(c)).collect()
            }
            None => candidates,
        };

        let total = filtered.len();
        let results = filtered
            .into_iter()
            .take(request.limit)
            .map(|c| c.into_result(request.include_vectors))
            .collect();

        SearchResponse { results, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::repository::{HashRepository, IndexDef, IndexRepository, RepoResult, RepositoryError};
    use crate::schema::{Document, Field, FieldKind};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct FakeBackend {
        hashes: std::sync::Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
        knn_rows: std::sync::Arc<Mutex<Vec<crate::repository::BackendRow>>>,
        bm25_rows: std::sync::Arc<Mutex<Vec<crate::repository::BackendRow>>>,
        supports_text: bool,
    }

    impl HashRepository for FakeBackend {
        async fn set_all(&self, key: &str, fields: BTreeMap<String, Vec<u8>>) -> RepoResult<()> {
            self.hashes.lock().unwrap().insert(key.to_string(), fields);
            Ok(())
        }
        async fn set_many_pipelined(&self, entries: Vec<(String, BTreeMap<String, Vec<u8>>)>) -> RepoResult<()> {
            let mut guard = self.hashes.lock().unwrap();
            for (k, v) in entries {
                guard.insert(k, v);
            }
            Ok(())
        }
        async fn get_all(&self, key: &str) -> RepoResult<Option<BTreeMap<String, Vec<u8>>>> {
            Ok(self.hashes.lock().unwrap().get(key).cloned())
        }
        async fn delete(&self, key: &str) -> RepoResult<bool> {
            Ok(self.hashes.lock().unwrap().remove(key).is_some())
        }
        async fn exists(&self, key: &str) -> RepoResult<bool> {
            Ok(self.hashes.lock().unwrap().contains_key(key))
        }
        async fn scan_by_prefix(&self, prefix: &str) -> RepoResult<Vec<String>> {
            Ok(self
                .hashes
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    impl IndexRepository for FakeBackend {
        async fn create(&self, _def: IndexDef) -> RepoResult<()> {
            Ok(())
        }
        async fn drop(&self, _name: &str) -> RepoResult<()> {
            Ok(())
        }
        async fn exists(&self, _name: &str) -> RepoResult<bool> {
            Ok(true)
        }
        fn supports_text_search(&self) -> bool {
            self.supports_text
        }
    }

    impl crate::repository::SearchRepository for FakeBackend {
        async fn knn(&self, _query: KnnQuery) -> RepoResult<Vec<crate::repository::BackendRow>> {
            Ok(self.knn_rows.lock().unwrap().clone())
        }
        async fn bm25(&self, _query: Bm25Query) -> RepoResult<Vec<crate::repository::BackendRow>> {
            Ok(self.bm25_rows.lock().unwrap().clone())
        }
        async fn list(
            &self,
            _index: &str,
            _query: &str,
            _offset: usize,
            _limit: usize,
            _fields: Vec<String>,
        ) -> RepoResult<Vec<crate::repository::BackendRow>> {
            Ok(vec![])
        }
        async fn count(&self, _index: &str, _query: &str) -> RepoResult<u64> {
            Ok(0)
        }
    }

    #[derive(Clone)]
    struct FixedEmbedder {
        vector: Vec<f32>,
    }

    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<EmbeddingResult, EmbeddingError> {
            Ok(EmbeddingResult {
                vector: self.vector.clone(),
                prompt_tokens: 1,
                total_tokens: 1,
            })
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn row(id: &str, score: f32, doc: &Document) -> crate::repository::BackendRow {
        crate::repository::BackendRow {
            id: id.to_string(),
            score,
            fields: codec::encode(doc),
        }
    }

    async fn seed_collection(backend: &FakeBackend, collection: Collection) {
        collection_store::create_collection(backend, backend, "vecdex:", collection)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn semantic_hit_returns_similarity_one_for_zero_distance() {
        let backend = FakeBackend {
            supports_text: true,
            ..Default::default()
        };
        let collection = Collection::new_text("notes", vec![], 4, 0).unwrap();
        seed_collection(&backend, collection).await;

        let doc = Document::new("a", "hello").with_vector(vec![1.0, 0.0, 0.0, 0.0]);
        backend.knn_rows.lock().unwrap().push(row("a", 0.0, &doc));

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![1.0, 0.0, 0.0, 0.0] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Semantic).with_query("hello").with_top_k(10);
        let response = service
            .search("notes", request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, "a");
        assert!((response.results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn filter_rejection_fails_without_calling_backend() {
        let backend = FakeBackend::default();
        let collection = Collection::new_text(
            "things",
            vec![
                Field::new("category", FieldKind::Tag),
                Field::new("price", FieldKind::Numeric),
            ],
            4,
            0,
        )
        .unwrap();
        seed_collection(&backend, collection).await;

        let bad_filter = crate::expr::ExpressionBuilder::new()
            .must(crate::expr::Condition::range("category", Some(crate::expr::Bound::Gte(10.0)), None).unwrap())
            .unwrap()
            .build();

        let service = SearchService::new(backend.clone(), FixedEmbedder { vector: vec![0.0; 4] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Semantic).with_query("x").with_filter(bad_filter);
        let err = service
            .search("things", request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(backend.knn_rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn geo_mode_rejects_non_geo_collection() {
        let backend = FakeBackend::default();
        let collection = Collection::new_text("notes", vec![], 4, 0).unwrap();
        seed_collection(&backend, collection).await;

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![0.0; 4] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Geo).with_geo_point(55.0, 37.0);
        let err = service
            .search("notes", request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CollectionTypeMismatch(_)));
    }

    #[tokio::test]
    async fn geo_filter_keeps_nearby_venues_ordered_ascending() {
        let backend = FakeBackend::default();
        let collection = Collection::new_geo("venues", vec![], 0).unwrap();
        seed_collection(&backend, collection).await;

        // d^2 values chosen so l2_squared_to_meters lands near1 ~1424m,
        // near2 ~1910m (both under the 2000m cutoff below) and far ~4030m
        // (over it).
        let near1 = Document::new("near1", "").with_vector(vec![1.0, 0.0, 0.0]);
        let near2 = Document::new("near2", "").with_vector(vec![1.0, 0.0, 0.0]);
        let far = Document::new("far", "").with_vector(vec![1.0, 0.0, 0.0]);
        backend.knn_rows.lock().unwrap().push(row("far", 4e-7, &far));
        backend.knn_rows.lock().unwrap().push(row("near1", 5e-8, &near1));
        backend.knn_rows.lock().unwrap().push(row("near2", 9e-8, &near2));

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![0.0; 3] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Geo)
            .with_geo_point(55.7539, 37.6208)
            .with_top_k(3)
            .with_min_score(2000.0);
        let response = service
            .search("venues", request, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near1", "near2"]);
        for window in response.results.windows(2) {
            assert!(window[0].score <= window[1].score);
        }
    }

    #[tokio::test]
    async fn topk_ge_limit_bounds_result_count_and_total() {
        let backend = FakeBackend {
            supports_text: true,
            ..Default::default()
        };
        let collection = Collection::new_text("notes", vec![], 2, 0).unwrap();
        seed_collection(&backend, collection).await;

        for i in 0..5 {
            let doc = Document::new(format!("d{i}"), "x").with_vector(vec![1.0, 0.0]);
            backend.knn_rows.lock().unwrap().push(row(&format!("d{i}"), 0.0, &doc));
        }

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![1.0, 0.0] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Semantic)
            .with_query("x")
            .with_top_k(10)
            .with_limit(2);
        let response = service
            .search("notes", request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert!(response.total >= response.results.len());
        assert_eq!(response.total, 5);
    }

    #[tokio::test]
    async fn similar_to_excludes_source_id_even_if_backend_returns_it() {
        let backend = FakeBackend::default();
        let collection = Collection::new_text("notes", vec![], 2, 0).unwrap();
        seed_collection(&backend, collection).await;

        let source = Document::new("a", "hi").with_vector(vec![1.0, 0.0]);
        let key = KeyLayout::document("vecdex:", "notes", "a");
        backend.set_all(&key, codec::encode(&source)).await.unwrap();

        let other = Document::new("b", "hi too").with_vector(vec![0.9, 0.1]);
        backend.knn_rows.lock().unwrap().push(row("a", 0.0, &source));
        backend.knn_rows.lock().unwrap().push(row("b", 0.1, &other));

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![0.0; 2] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Semantic).with_top_k(10);
        let response = service
            .similar_to("notes", "a", request, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!response.results.iter().any(|r| r.id == "a"));
        assert_eq!(response.results[0].id, "b");
    }

    #[tokio::test]
    async fn keyword_mode_fails_without_text_capability() {
        let backend = FakeBackend {
            supports_text: false,
            ..Default::default()
        };
        let collection = Collection::new_text("notes", vec![], 4, 0).unwrap();
        seed_collection(&backend, collection).await;

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![0.0; 4] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Keyword).with_query("hello");
        let err = service
            .search("notes", request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeywordNotSupported));
    }

    #[tokio::test]
    async fn hybrid_fuses_and_orders_per_worked_example() {
        let backend = FakeBackend {
            supports_text: true,
            ..Default::default()
        };
        let collection = Collection::new_text("notes", vec![], 4, 0).unwrap();
        seed_collection(&backend, collection).await;

        let a = Document::new("a", "a").with_vector(vec![1.0, 0.0, 0.0, 0.0]);
        let b = Document::new("b", "b").with_vector(vec![0.0, 1.0, 0.0, 0.0]);
        let c = Document::new("c", "c").with_vector(vec![0.0, 0.0, 1.0, 0.0]);

        // KNN ranks [a, b]
        backend.knn_rows.lock().unwrap().push(row("a", 0.0, &a));
        backend.knn_rows.lock().unwrap().push(row("b", 0.1, &b));
        // BM25 ranks [b, c]
        backend.bm25_rows.lock().unwrap().push(row("b", 5.0, &b));
        backend.bm25_rows.lock().unwrap().push(row("c", 3.0, &c));

        let service = SearchService::new(backend, FixedEmbedder { vector: vec![1.0, 0.0, 0.0, 0.0] }, "vecdex:");
        let request = SearchRequest::new(SearchMode::Hybrid).with_query("x").with_top_k(10);
        let response = service
            .search("notes", request, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
