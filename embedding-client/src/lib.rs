//! Async batch embedding client (§4.2). Stateless: the declared dimension is
//! enforced by the caller, a mismatch with the index is a fatal programming
//! error rather than a recoverable one.

pub mod cache;

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use tokio_retry::{strategy::FixedInterval, Retry};

use common::EngineError;

/// Batch text -> embedding client. One call per batch; retries once on
/// transient failure, then fails the whole query with `EmbeddingUnavailable`.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let mut out = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        out.pop()
            .ok_or_else(|| EngineError::EmbeddingUnavailable("empty embedding response".into()))
    }

    /// Dimension the client is configured to produce; used to validate
    /// index-stored embeddings at the boundary.
    fn dimension(&self) -> usize;
}

/// Production client backed by the OpenAI embeddings API, the same
/// `async-openai` client construction the rest of the corpus uses.
pub struct OpenAiEmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>, dimension: usize) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            dimension,
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .dimensions(self.dimension as u32)
            .input(texts.to_vec())
            .build()
            .map_err(|e| EngineError::EmbeddingUnavailable(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EngineError::EmbeddingUnavailable(e.to_string()))?;

        if response.data.len() != texts.len() {
            return Err(EngineError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut by_index: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in response.data {
            if let Some(slot) = by_index.get_mut(item.index as usize) {
                *slot = Some(item.embedding);
            }
        }
        by_index
            .into_iter()
            .map(|v| v.ok_or_else(|| EngineError::EmbeddingUnavailable("missing embedding index".into())))
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let strategy = FixedInterval::from_millis(50).take(1);
        let texts = texts.to_vec();
        Retry::spawn(strategy, || async { self.embed_once(&texts).await })
            .await
            .map_err(|_| EngineError::EmbeddingUnavailable("embedding request failed after retry".into()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic hash-based test double, grounded on the teacher's
/// `EmbeddingProvider::new_hashed` pattern: no network access required to
/// exercise the rest of the engine.
pub struct HashedEmbeddingClient {
    dimension: usize,
}

impl HashedEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};
        let mut out = vec![0.0f32; self.dimension];
        let mut seed = text.as_bytes().to_vec();
        let mut counter: u32 = 0;
        let mut filled = 0;
        while filled < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(&seed);
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if filled >= self.dimension {
                    break;
                }
                let mut bytes = [0u8; 4];
                bytes[..chunk.len()].copy_from_slice(chunk);
                let v = u32::from_le_bytes(bytes) as f32 / u32::MAX as f32;
                out[filled] = v * 2.0 - 1.0;
                filled += 1;
            }
            counter += 1;
            seed = digest.to_vec();
        }
        let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl EmbeddingClient for HashedEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_client_is_deterministic_and_declares_dimension() {
        let client = HashedEmbeddingClient::new(16);
        let a = client.embed_one("hello world").await.unwrap();
        let b = client.embed_one("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(client.dimension(), 16);
    }

    #[tokio::test]
    async fn hashed_client_differs_across_inputs() {
        let client = HashedEmbeddingClient::new(8);
        let a = client.embed_one("alpha").await.unwrap();
        let b = client.embed_one("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let client = HashedEmbeddingClient::new(4);
        let out = client.embed_batch(&[]).await.unwrap();
        assert!(out.is_empty());
    }
}
