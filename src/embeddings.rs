//! Embedding providers: the seam between the pipeline and the embedding
//! model service.
//!
//! Indexing and querying must share one provider instance; mixing embedding
//! spaces silently corrupts ranking, so the provider is constructed once and
//! injected into both the indexer and the retriever.

use std::sync::Arc;

use async_trait::async_trait;
use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};
use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::types::SolaceError;

/// Largest batch handed to a provider in one call.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Maps text into fixed-dimension vectors.
///
/// Implementations are opaque services; the pipeline only relies on the
/// dimension being stable and identical texts producing identical vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimension produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short identifier for telemetry.
    fn id(&self) -> &str;

    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SolaceError>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SolaceError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SolaceError::Retrieval("embedder returned no vector".to_string()))
    }
}

// ── Deterministic local provider ───────────────────────────────────────

/// Dimension of the deterministic local embedding.
pub const MOCK_DIMENSIONS: usize = 256;

/// Deterministic, dependency-free embedding provider.
///
/// Each word contributes two hash buckets: one for the full word and one
/// for its leading four characters, so inflected forms ("anxious" /
/// "anxiety") land near each other while identical texts embed
/// identically. Vectors are L2-normalized, making cosine similarity
/// maximal for exact matches. Used by tests and as the offline default
/// when no embedding endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    fn embed_text(text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
        let mut any = false;

        for word in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let word = word.to_lowercase();
            let stem: String = word.chars().take(4).collect();
            for token in [word.as_str(), stem.as_str()] {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                let bucket = (hasher.finish() % MOCK_DIMENSIONS as u64) as usize;
                vector[bucket] += 1.0;
                any = true;
            }
        }

        if !any {
            // Keep a non-zero vector so cosine distance stays defined.
            vector[0] = 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }

    fn id(&self) -> &str {
        "mock-hash"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SolaceError> {
        Ok(texts.iter().map(|text| Self::embed_text(text)).collect())
    }
}

// ── HTTP provider (OpenAI-compatible /embeddings) ──────────────────────

/// Embedding provider backed by an OpenAI-compatible `/embeddings`
/// endpoint (e.g. a local text-embeddings-inference server).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            retry,
        }
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SolaceError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|err| SolaceError::Retrieval(format!("embedding request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(SolaceError::Retrieval(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| SolaceError::Retrieval(format!("malformed embedding response: {err}")))?;

        if body.data.len() != texts.len() {
            return Err(SolaceError::Retrieval(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                body.data.len(),
                texts.len()
            )));
        }

        let mut data = body.data;
        data.sort_by_key(|datum| datum.index);
        Ok(data.into_iter().map(|datum| datum.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SolaceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("embed_batch", || self.request_batch(texts))
            .await
    }
}

// ── rig adapter ────────────────────────────────────────────────────────

/// Adapter exposing any [`EmbeddingProvider`] through rig's
/// [`EmbeddingModel`] trait so the sqlite vector store can size and fill
/// its embedding table.
#[derive(Clone)]
pub struct ProviderEmbeddingModel {
    provider: Arc<dyn EmbeddingProvider>,
}

impl ProviderEmbeddingModel {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

impl EmbeddingModel for ProviderEmbeddingModel {
    const MAX_DOCUMENTS: usize = EMBED_BATCH_SIZE;

    fn ndims(&self) -> usize {
        self.provider.dimensions()
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let documents: Vec<String> = texts.into_iter().collect();
        let provider = self.provider.clone();
        async move {
            let vectors = provider
                .embed_batch(&documents)
                .await
                .map_err(|err| EmbeddingError::ProviderError(err.to_string()))?;
            Ok(documents
                .into_iter()
                .zip(vectors)
                .map(|(document, vector)| Embedding {
                    document,
                    vec: vector.into_iter().map(f64::from).collect(),
                })
                .collect())
        }
    }
}
