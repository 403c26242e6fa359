use super::{EmbeddingError, EmbeddingResult};
use crate::codec::{pack_vector, unpack_vector};
use crate::embedding::Embedder;
use crate::key_layout::KeyLayout;
use crate::repository::CacheRepository;
use sha2::{Digest, Sha256};

/// content-addressed cache layer of the embedding chain.
///
/// key = `"{prefix}emb_cache:" + hex(SHA-256(text))`. on hit, returns the
/// stored vector with `prompt_tokens`/`total_tokens` both zero. on miss,
/// delegates then writes the result back best-effort — a cache-write
/// failure is logged, never propagated.
pub struct CachingEmbedder<E, C> {
    inner: E,
    cache: C,
    prefix: String,
}

impl<E, C> CachingEmbedder<E, C> {
    pub fn new(inner: E, cache: C, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            prefix: prefix.into(),
        }
    }

    fn cache_key(&self, text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        KeyLayout::embedding_cache(&self.prefix, &hex::encode(digest))
    }
}

impl<E: Embedder, C: CacheRepository> Embedder for CachingEmbedder<E, C> {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        let key = self.cache_key(text);

        match self.cache.get_bytes(&key).await {
            Ok(Some(bytes)) => match unpack_vector(&bytes) {
                Ok(vector) => {
                    tracing::debug!(provider = self.inner.name(), %key, "embedding cache hit");
                    return Ok(EmbeddingResult {
                        vector,
                        prompt_tokens: 0,
                        total_tokens: 0,
                    });
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "embedding cache value corrupt, treating as miss");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%key, error = %e, "embedding cache read failed, treating as miss");
            }
        }

        let result = self.inner.embed(text).await?;

        if let Err(e) = self.cache.set_bytes(&key, pack_vector(&result.vector)).await {
            tracing::warn!(%key, error = %e, "embedding cache write-behind failed");
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
