//! collection/document/batch upsert orchestration: schema validation,
//! vectorization (single or batch, geo vs. text), rollback on partial
//! failure
//!
//! `IngestionService` mirrors `SearchService`'s generic-collaborator
//! shape: generic over the backend repository bundle and the embedder.

use crate::codec;
use crate::collection_store;
use crate::embedding::{BatchEmbedder, Embedder};
use crate::error::{Error, Result};
use crate::geo;
use crate::key_layout::KeyLayout;
use crate::repository::Backend;
use crate::schema::{Collection, Document};
use tokio_util::sync::CancellationToken;

/// batch upsert size cap
pub const MAX_BATCH_SIZE: usize = 100;

/// outcome of a single-document upsert: whether the document was created
/// (as opposed to overwriting an existing one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
}

/// the per-item outcome of a batch upsert: either the document's upsert
/// outcome, or the error that document failed validation/vectorization
/// with. the slice preserves input order regardless of backend completion
/// order.
#[derive(Debug)]
pub enum BatchItemResult {
    Ok(UpsertOutcome),
    Err(Error),
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Other(anyhow::anyhow!("operation cancelled")))
    } else {
        Ok(())
    }
}

/// `IngestionService<R, E>`: generic over the backend repository bundle and
/// the embedder, mirroring `SearchService`'s collaborator shape.
#[derive(Clone)]
pub struct IngestionService<R, E> {
    repo: R,
    embedder: E,
    prefix: String,
}

impl<R: Backend + Clone, E: Embedder + BatchEmbedder> IngestionService<R, E> {
    pub fn new(repo: R, embedder: E, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            embedder,
            prefix: prefix.into(),
        }
    }

    /// create a collection: the atomic pair of metadata record then
    /// secondary index, with best-effort rollback on index-create failure.
    #[tracing::instrument(skip(self, collection), fields(collection = %collection.name))]
    pub async fn create_collection(&self, collection: Collection) -> Result<Collection> {
        collection_store::create_collection(&self.repo, &self.repo, &self.prefix, collection).await
    }

    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        collection_store::drop_collection(&self.repo, &self.repo, &self.prefix, name).await
    }

    async fn load_active_collection(&self, name: &str) -> Result<Collection> {
        let collection = collection_store::load_collection(&self.repo, &self.prefix, name).await?;
        if collection.state != crate::schema::CollectionState::Active {
            return Err(Error::InvalidSchema(format!(
                "collection {name:?} is not active"
            )));
        }
        Ok(collection)
    }

    fn validate_common(&self, collection: &Collection, document: &Document) -> Result<()> {
        document.validate_shape()?;
        document.validate_against_schema(collection)?;
        Ok(())
    }

    async fn persist(&self, collection_name: &str, document: &Document) -> Result<UpsertOutcome> {
        let key = KeyLayout::document(&self.prefix, collection_name, &document.id);
        let created = !self.repo.exists(&key).await?;
        self.repo.set_all(&key, codec::encode(document)).await?;
        Ok(UpsertOutcome { created })
    }

    /// upsert a single text document: validate, embed `content` through the
    /// decorator chain (cache hits cost nothing), persist.
    #[tracing::instrument(skip(self, document, cancel), fields(collection = %collection_name, id = %document.id))]
    pub async fn upsert_text_document(
        &self,
        collection_name: &str,
        mut document: Document,
        cancel: &CancellationToken,
    ) -> Result<UpsertOutcome> {
        check_cancelled(cancel)?;
        let collection = self.load_active_collection(collection_name).await?;
        if collection.is_geo() {
            return Err(Error::CollectionTypeMismatch(
                "upsert_text_document requires a text collection".to_string(),
            ));
        }
        self.validate_common(&collection, &document)?;

        check_cancelled(cancel)?;
        let embedding = self.embedder.embed(&document.content).await?;
        if embedding.vector.len() as u32 != collection.vector_dim {
            return Err(Error::VectorDimMismatch {
                expected: collection.vector_dim,
                actual: embedding.vector.len() as u32,
            });
        }
        document.vector = Some(embedding.vector);

        self.persist(collection_name, &document).await
    }

    /// upsert a single geo document: the vector comes from the geo
    /// transform on the `latitude`/`longitude` numerics; the embedding
    /// chain is never invoked.
    #[tracing::instrument(skip(self, document), fields(collection = %collection_name, id = %document.id))]
    pub async fn upsert_geo_document(&self, collection_name: &str, mut document: Document) -> Result<UpsertOutcome> {
        let collection = self.load_active_collection(collection_name).await?;
        if !collection.is_geo() {
            return Err(Error::CollectionTypeMismatch(
                "upsert_geo_document requires a geo collection".to_string(),
            ));
        }
        self.validate_common(&collection, &document)?;
        let (lat, lon) = document.geo_coordinates()?;
        document.vector = Some(geo::lat_lon_to_unit_ecef(lat, lon).to_vec());

        self.persist(collection_name, &document).await
    }

    /// batch upsert, capped at `MAX_BATCH_SIZE` per call. invalid elements
    /// get per-item error results; valid ones pass on. for text
    /// collections the batch embedding entry point is called exactly once
    /// with the surviving contents, in order; on failure every surviving
    /// element fails. the pipelined write is a single all-or-nothing
    /// backend call on the service's side, but a failure there marks every
    /// surviving element failed without rolling back whatever the backend
    /// already committed: retrying is idempotent from the caller's side.
    #[tracing::instrument(skip(self, documents, cancel), fields(collection = %collection_name, count = documents.len()))]
    pub async fn batch_upsert(
        &self,
        collection_name: &str,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> Result<Vec<BatchItemResult>> {
        check_cancelled(cancel)?;
        if documents.len() > MAX_BATCH_SIZE {
            return Err(Error::InvalidSchema(format!(
                "batch size {} exceeds cap of {MAX_BATCH_SIZE}",
                documents.len()
            )));
        }
        let collection = self.load_active_collection(collection_name).await?;

        // slot i holds either the validated document (pending vectorization)
        // or the terminal error for that input position.
        let mut slots: Vec<std::result::Result<Document, Error>> = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = self.validate_common(&collection, &document).map(|_| document);
            slots.push(outcome);
        }

        if collection.is_geo() {
            for slot in slots.iter_mut() {
                if let Ok(document) = slot {
                    match document.geo_coordinates() {
                        Ok((lat, lon)) => document.vector = Some(geo::lat_lon_to_unit_ecef(lat, lon).to_vec()),
                        Err(e) => *slot = Err(e),
                    }
                }
            }
        } else {
            let surviving_texts: Vec<String> = slots
                .iter()
                .filter_map(|s| s.as_ref().ok())
                .map(|d| d.content.clone())
                .collect();

            if !surviving_texts.is_empty() {
                check_cancelled(cancel)?;
                match self.embedder.embed_batch(&surviving_texts).await {
                    Ok(embeddings) => {
                        let mut embeddings = embeddings.into_iter();
                        for slot in slots.iter_mut() {
                            if let Ok(document) = slot {
                                match embeddings.next() {
                                    Some(embedding) if embedding.vector.len() as u32 == collection.vector_dim => {
                                        document.vector = Some(embedding.vector);
                                    }
                                    Some(embedding) => {
                                        *slot = Err(Error::VectorDimMismatch {
                                            expected: collection.vector_dim,
                                            actual: embedding.vector.len() as u32,
                                        });
                                    }
                                    None => {
                                        *slot = Err(Error::EmbeddingProvider(
                                            "batch embedder returned fewer results than surviving documents"
                                                .to_string(),
                                        ));
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let batch_err: Error = e.into();
                        for slot in slots.iter_mut() {
                            if slot.is_ok() {
                                *slot = Err(Error::EmbeddingProvider(batch_err.to_string()));
                            }
                        }
                    }
                }
            }
        }

        // assign vectors back in input order, then issue a single
        // pipelined write for every surviving document.
        let mut entries = Vec::new();
        let mut pending_keys = Vec::new();
        for slot in slots.iter() {
            if let Ok(document) = slot {
                let key = KeyLayout::document(&self.prefix, collection_name, &document.id);
                pending_keys.push(key.clone());
                entries.push((key, codec::encode(document)));
            }
        }

        let mut preexisted = vec![false; entries.len()];
        for (i, key) in pending_keys.iter().enumerate() {
            preexisted[i] = self.repo.exists(key).await?;
        }

        let write_result: Result<()> = if entries.is_empty() {
            Ok(())
        } else {
            self.repo.set_many_pipelined(entries).await.map_err(Error::from)
        };

        let mut preexisted = preexisted.into_iter();
        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Err(e) => results.push(BatchItemResult::Err(e)),
                Ok(_) => match &write_result {
                    Ok(()) => {
                        let created = !preexisted.next().unwrap_or(false);
                        results.push(BatchItemResult::Ok(UpsertOutcome { created }));
                    }
                    Err(e) => {
                        preexisted.next();
                        results.push(BatchItemResult::Err(Error::Other(anyhow::anyhow!(e.to_string()))));
                    }
                },
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::repository::{HashRepository, IndexDef, IndexRepository, RepoResult, RepositoryError};
    use crate::schema::{Field, FieldKind};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct FakeBackend {
        hashes: std::sync::Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
        fail_pipelined: bool,
        supports_text: bool,
    }

    impl HashRepository for FakeBackend {
        async fn set_all(&self, key: &str, fields: BTreeMap<String, Vec<u8>>) -> RepoResult<()> {
            self.hashes.lock().unwrap().insert(key.to_string(), fields);
            Ok(())
        }
        async fn set_many_pipelined(&self, entries: Vec<(String, BTreeMap<String, Vec<u8>>)>) -> RepoResult<()> {
            if self.fail_pipelined {
                return Err(RepositoryError::Backend(anyhow::anyhow!("pipeline failed")));
            }
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
        async fn knn(&self, _query: crate::repository::KnnQuery) -> RepoResult<Vec<crate::repository::BackendRow>> {
            Ok(vec![])
        }
        async fn bm25(&self, _query: crate::repository::Bm25Query) -> RepoResult<Vec<crate::repository::BackendRow>> {
            Ok(vec![])
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
        dim: usize,
    }

    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> std::result::Result<EmbeddingResult, EmbeddingError> {
            Ok(EmbeddingResult {
                vector: vec![text.len() as f32; self.dim],
                prompt_tokens: 1,
                total_tokens: 1,
            })
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    async fn seed(backend: &FakeBackend, collection: Collection) {
        collection_store::create_collection(backend, backend, "vecdex:", collection)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upsert_text_document_embeds_content_and_reports_created() {
        let backend = FakeBackend::default();
        seed(&backend, Collection::new_text("notes", vec![], 4, 0).unwrap()).await;

        let service = IngestionService::new(backend, FixedEmbedder { dim: 4 }, "vecdex:");
        let doc = Document::new("a", "hello");
        let outcome = service
            .upsert_text_document("notes", doc, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.created);

        let doc2 = Document::new("a", "hello again");
        let outcome2 = service
            .upsert_text_document("notes", doc2, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!outcome2.created);
    }

    #[tokio::test]
    async fn upsert_geo_document_does_not_call_embedder() {
        let backend = FakeBackend::default();
        seed(&backend, Collection::new_geo("venues", vec![], 0).unwrap()).await;

        let service = IngestionService::new(backend.clone(), FixedEmbedder { dim: 99 }, "vecdex:");
        let doc = Document::new("v1", "").with_numeric("latitude", 55.75).with_numeric("longitude", 37.6);
        let outcome = service.upsert_geo_document("venues", doc).await.unwrap();
        assert!(outcome.created);

        let key = KeyLayout::document("vecdex:", "venues", "v1");
        let hash = backend.get_all(&key).await.unwrap().unwrap();
        let stored = codec::decode("v1", &hash).unwrap();
        assert_eq!(stored.vector.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn geo_document_rejects_out_of_range_coordinates() {
        let backend = FakeBackend::default();
        seed(&backend, Collection::new_geo("venues", vec![], 0).unwrap()).await;

        let service = IngestionService::new(backend, FixedEmbedder { dim: 3 }, "vecdex:");
        let doc = Document::new("v1", "").with_numeric("latitude", 91.0).with_numeric("longitude", 0.0);
        let err = service.upsert_geo_document("venues", doc).await.unwrap_err();
        assert!(matches!(err, Error::GeoQueryInvalid(_)));
    }

    #[tokio::test]
    async fn batch_partial_invalidity_isolates_failures_and_calls_embed_batch_with_survivors() {
        let backend = FakeBackend::default();
        seed(
            &backend,
            Collection::new_text("things", vec![Field::new("category", FieldKind::Tag)], 4, 0).unwrap(),
        )
        .await;

        let service = IngestionService::new(backend, FixedEmbedder { dim: 4 }, "vecdex:");
        let docs = vec![
            Document::new("a", "one").with_tag("undeclared", "x"),
            Document::new("b", "two"),
            Document::new("c", "three"),
        ];
        let results = service
            .batch_upsert("things", docs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], BatchItemResult::Err(Error::InvalidSchema(_))));
        assert!(matches!(results[1], BatchItemResult::Ok(UpsertOutcome { created: true })));
        assert!(matches!(results[2], BatchItemResult::Ok(UpsertOutcome { created: true })));
    }

    #[tokio::test]
    async fn batch_size_cap_rejected_before_touching_backend() {
        let backend = FakeBackend::default();
        seed(&backend, Collection::new_text("notes", vec![], 4, 0).unwrap()).await;

        let service = IngestionService::new(backend.clone(), FixedEmbedder { dim: 4 }, "vecdex:");
        let docs: Vec<Document> = (0..MAX_BATCH_SIZE + 1)
            .map(|i| Document::new(format!("d{i}"), "x"))
            .collect();
        let err = service
            .batch_upsert("notes", docs, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn pipelined_write_failure_fails_all_surviving_elements() {
        let backend = FakeBackend {
            fail_pipelined: true,
            ..Default::default()
        };
        seed(&backend, Collection::new_text("notes", vec![], 4, 0).unwrap()).await;

        let service = IngestionService::new(backend, FixedEmbedder { dim: 4 }, "vecdex:");
        let docs = vec![Document::new("a", "one"), Document::new("b", "two")];
        let results = service
            .batch_upsert("notes", docs, &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.iter().all(|r| matches!(r, BatchItemResult::Err(_))));
    }

    #[tokio::test]
    async fn create_collection_rejects_duplicate_name() {
        let backend = FakeBackend::default();
        let service = IngestionService::new(backend, FixedEmbedder { dim: 4 }, "vecdex:");
        let collection = Collection::new_text("notes", vec![], 4, 0).unwrap();
        service.create_collection(collection.clone()).await.unwrap();
        let err = service.create_collection(collection).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }
}
