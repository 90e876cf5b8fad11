//! The offline indexing pipeline: chunk, embed in batches, persist.

use std::path::Path;
use std::sync::Arc;

use crate::embeddings::{EmbeddingProvider, EMBED_BATCH_SIZE};
use crate::ingestion::chunker::{chunk_document, ChunkerConfig};
use crate::ingestion::loader::Document;
use crate::stores::{Backend, ChunkRecord};
use crate::types::SolaceError;

/// Counters reported after an indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub chunks_written: usize,
}

/// Builds the index from `documents` into `store`.
///
/// Re-running against the same store replaces its contents wholesale, so
/// repeated runs never accumulate duplicates. Progress is reported as
/// tracing events; the returned [`IndexReport`] is for caller display.
///
/// # Errors
///
/// [`SolaceError::EmptyCorpus`] when the whole corpus yields zero chunks;
/// embedding and storage failures propagate as-is and abort the run.
pub async fn build_index(
    documents: Vec<Document>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: &dyn Backend,
    config: ChunkerConfig,
    corpus_path: &Path,
) -> Result<IndexReport, SolaceError> {
    // Wholesale replacement keeps re-runs idempotent.
    store.clear().await?;

    let mut report = IndexReport::default();

    for document in &documents {
        let chunks: Vec<_> = chunk_document(document, config).collect();
        if chunks.is_empty() {
            tracing::warn!(source = %document.source_id, "document yielded no chunks, skipping");
            report.documents_skipped += 1;
            continue;
        }

        let mut written = 0usize;
        for window in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = window.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            let records: Vec<ChunkRecord> = window
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| ChunkRecord::from_chunk(chunk).with_embedding(vector))
                .collect();
            written += records.len();
            store.insert_chunks(records).await?;
        }

        tracing::info!(
            source = %document.source_id,
            chunks = written,
            embedder = embedder.id(),
            "indexed document"
        );
        report.documents_indexed += 1;
        report.chunks_written += written;
    }

    if report.chunks_written == 0 {
        return Err(SolaceError::EmptyCorpus {
            path: corpus_path.to_path_buf(),
        });
    }

    tracing::info!(
        documents = report.documents_indexed,
        skipped = report.documents_skipped,
        chunks = report.chunks_written,
        "indexing complete"
    );
    Ok(report)
}
