//! Top-k similarity retrieval over the persisted chunk index.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::stores::{Backend, ChunkRecord};
use crate::types::SolaceError;

/// A retrieved chunk with its similarity score, most similar first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    pub score: f32,
}

impl ScoredChunk {
    /// Source attribution for this chunk.
    pub fn source(&self) -> &str {
        &self.chunk.source
    }

    pub fn text(&self) -> &str {
        &self.chunk.content
    }
}

/// Embeds queries and delegates nearest-neighbor lookup to the store.
///
/// Holds the same [`EmbeddingProvider`] instance used at indexing time;
/// query vectors therefore live in the same embedding space as the stored
/// chunks, which is a hard invariant of the ranking.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn Backend>,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn Backend>, k: usize) -> Self {
        Self {
            embedder,
            store,
            k: k.max(1),
        }
    }

    /// Configured result budget.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns up to `k` chunks ranked by descending similarity.
    ///
    /// # Errors
    ///
    /// Embedder and store failures both surface as
    /// [`SolaceError::Retrieval`]; callers present a uniform degraded
    /// response and may retry.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, SolaceError> {
        let query_vector = self.embed_query(query).await?;
        self.lookup(&query_vector).await
    }

    /// Embeds the query text in the index's embedding space.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SolaceError> {
        self.embedder.embed_query(query).await
    }

    /// Nearest-neighbor lookup for an already-embedded query.
    pub async fn lookup(&self, query_vector: &[f32]) -> Result<Vec<ScoredChunk>, SolaceError> {
        let hits = self
            .store
            .search_similar(query_vector, self.k)
            .await
            .map_err(|err| SolaceError::Retrieval(err.to_string()))?;

        tracing::debug!(
            k = self.k,
            returned = hits.len(),
            embedder = self.embedder.id(),
            "retrieval complete"
        );

        Ok(hits
            .into_iter()
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use async_trait::async_trait;

    /// Store double returning a fixed ranked list.
    struct FixedBackend {
        hits: Vec<(ChunkRecord, f32)>,
    }

    #[async_trait]
    impl Backend for FixedBackend {
        async fn insert_chunks(&self, _chunks: Vec<ChunkRecord>) -> Result<(), SolaceError> {
            Ok(())
        }

        async fn search_similar(
            &self,
            _query_embedding: &[f32],
            top_k: usize,
        ) -> Result<Vec<(ChunkRecord, f32)>, SolaceError> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }

        async fn count(&self) -> Result<usize, SolaceError> {
            Ok(self.hits.len())
        }

        async fn clear(&self) -> Result<(), SolaceError> {
            Ok(())
        }
    }

    fn record(id: &str, source: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            source: source.to_string(),
            chunk_index: 0,
            start_offset: 0,
            content: format!("content of {id}"),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn returns_at_most_k_results() {
        let store = Arc::new(FixedBackend {
            hits: vec![
                (record("1", "a.txt"), 0.9),
                (record("2", "b.txt"), 0.8),
                (record("3", "c.txt"), 0.7),
                (record("4", "d.txt"), 0.6),
            ],
        });
        let retriever = Retriever::new(Arc::new(MockEmbeddingProvider::new()), store, 2);
        let hits = retriever.retrieve("anything").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source(), "a.txt");
    }

    #[tokio::test]
    async fn returns_everything_when_fewer_than_k() {
        let store = Arc::new(FixedBackend {
            hits: vec![(record("1", "a.txt"), 0.9)],
        });
        let retriever = Retriever::new(Arc::new(MockEmbeddingProvider::new()), store, 3);
        let hits = retriever.retrieve("anything").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn store_failures_surface_as_retrieval_errors() {
        struct FailingBackend;

        #[async_trait]
        impl Backend for FailingBackend {
            async fn insert_chunks(&self, _chunks: Vec<ChunkRecord>) -> Result<(), SolaceError> {
                Ok(())
            }
            async fn search_similar(
                &self,
                _query_embedding: &[f32],
                _top_k: usize,
            ) -> Result<Vec<(ChunkRecord, f32)>, SolaceError> {
                Err(SolaceError::Storage("disk on fire".into()))
            }
            async fn count(&self) -> Result<usize, SolaceError> {
                Ok(0)
            }
            async fn clear(&self) -> Result<(), SolaceError> {
                Ok(())
            }
        }

        let retriever = Retriever::new(
            Arc::new(MockEmbeddingProvider::new()),
            Arc::new(FailingBackend),
            3,
        );
        let err = retriever.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, SolaceError::Retrieval(_)));
    }
}
