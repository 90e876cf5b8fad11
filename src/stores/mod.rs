//! Persistent index storage for chunk embeddings.
//!
//! The [`Backend`] trait is the contract the rest of the pipeline codes
//! against; [`sqlite::SqliteChunkStore`] is the shipped implementation
//! (sqlite + sqlite-vec). The store is read-mostly after indexing:
//! concurrent queries need no locking, and re-indexing while serving is
//! not supported (indexing and serving are mutually exclusive phases).

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ingestion::Chunk;
use crate::types::SolaceError;

pub use sqlite::{ChunkDocument, SqliteChunkStore};

/// A chunk plus provenance and (optionally) its embedding, ready for
/// persistence. Backend-agnostic; each backend converts to its own row
/// representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk identifier.
    pub id: String,
    /// Source document path, used for answer attribution.
    pub source: String,
    /// Zero-based index of the chunk within its document.
    pub chunk_index: usize,
    /// Byte offset of the chunk within its document.
    pub start_offset: usize,
    /// Chunk text.
    pub content: String,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
    /// Embedding vector, present once the chunk has been embedded.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    /// Builds a record from a chunker output with a fresh id.
    pub fn from_chunk(chunk: Chunk) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: chunk.source_id,
            chunk_index: chunk.sequence_index,
            start_offset: chunk.start_offset,
            content: chunk.text,
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    /// Attaches the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Unified contract for chunk index stores.
///
/// `search_similar` ranks by descending cosine similarity, returns at most
/// `top_k` entries, never duplicates a chunk, and returns everything when
/// fewer than `top_k` entries exist.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Persists chunk records; records without embeddings are skipped.
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), SolaceError>;

    /// Nearest-neighbor lookup by cosine similarity, most similar first.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, SolaceError>;

    /// Total number of persisted chunks.
    async fn count(&self) -> Result<usize, SolaceError>;

    /// Removes every entry; used for wholesale re-indexing.
    async fn clear(&self) -> Result<(), SolaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_chunk_preserves_provenance() {
        let chunk = Chunk {
            text: "calming routine".to_string(),
            start_offset: 128,
            source_id: "corpus/wellness.txt".to_string(),
            sequence_index: 4,
        };
        let record = ChunkRecord::from_chunk(chunk).with_embedding(vec![0.5; 4]);
        assert_eq!(record.source, "corpus/wellness.txt");
        assert_eq!(record.chunk_index, 4);
        assert_eq!(record.start_offset, 128);
        assert!(record.embedding.is_some());
        assert!(!record.id.is_empty());
    }
}
