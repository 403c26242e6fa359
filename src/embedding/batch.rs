use super::{EmbeddingError, EmbeddingResult, API_BATCH_MAX};
use crate::embedding::Embedder;

/// the batch entry point: fans out at `API_BATCH_MAX` texts per underlying
/// call, concatenating results in input order. the default implementation
/// falls back to sequential single-text `embed` calls, summing tokens —
/// providers with a native batch API override `embed_batch` directly.
pub trait BatchEmbedder: Embedder {
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<EmbeddingResult>, EmbeddingError>> + Send {
        async move {
            let mut results = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(API_BATCH_MAX) {
                for text in chunk {
                    results.push(self.embed(text).await?);
                }
            }
            Ok(results)
        }
    }
}

impl<T: Embedder> BatchEmbedder for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingResult {
                vector: vec![text.len() as f32],
                prompt_tokens: 1,
                total_tokens: 1,
            })
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn default_batch_preserves_input_order() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let texts: Vec<String> = vec!["a".into(), "bb".into(), "ccc".into()];
        let results = embedder.embed_batch(&texts).await.unwrap();
        let lengths: Vec<f32> = results.iter().map(|r| r.vector[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn batch_sums_tokens_per_item() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let texts: Vec<String> = vec!["x".into(), "y".into()];
        let results = embedder.embed_batch(&texts).await.unwrap();
        let total: u32 = results.iter().map(|r| r.total_tokens).sum();
        assert_eq!(total, 2);
    }
}
