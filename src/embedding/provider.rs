//! OpenAI-compatible embeddings provider
//!
//! the innermost link of the embedding decorator chain: talks HTTP, carries
//! the API key, and returns raw vectors plus token accounting. a
//! `reqwest::Client`, an API key, and a fixed request/response pair,
//! adapted to the OpenAI `/v1/embeddings` request/response schema so any
//! OpenAI-compatible endpoint (OpenAI itself, or a self-hosted gateway) can
//! be pointed at by varying `base_url`.

use super::{Embedder, EmbeddingError, EmbeddingResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    total_tokens: u32,
}

/// an OpenAI-compatible `/v1/embeddings` client.
///
/// cheap to clone: `Client` internally shares a connection pool via `Arc`.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl Embedder for OpenAiCompatibleProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        let request = EmbeddingsRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status, body });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Other(anyhow::anyhow!("failed to parse response: {e}")))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::EmptyResponse)?;

        Ok(EmbeddingResult {
            vector,
            prompt_tokens: parsed.usage.prompt_tokens,
            total_tokens: parsed.usage.total_tokens,
        })
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}
