//! End-to-end indexing and retrieval against a real sqlite-vec store,
//! using the deterministic embedding provider so rankings are stable.

use std::path::Path;
use std::sync::Arc;

use solace_rag::embeddings::{EmbeddingProvider, MockEmbeddingProvider, ProviderEmbeddingModel};
use solace_rag::ingestion::chunker::ChunkerConfig;
use solace_rag::ingestion::indexer::build_index;
use solace_rag::ingestion::loader::Document;
use solace_rag::retrieval::Retriever;
use solace_rag::stores::{Backend, SqliteChunkStore};
use solace_rag::types::SolaceError;

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(MockEmbeddingProvider::new())
}

fn doc(source: &str, content: &str) -> Document {
    Document {
        source_id: source.to_string(),
        content: content.to_string(),
    }
}

fn wellness_corpus() -> Vec<Document> {
    vec![
        doc("breathing.txt", "Deep breathing exercises can reduce anxiety."),
        doc("sleep.txt", "A regular sleep schedule supports emotional stability."),
        doc("journaling.txt", "Journaling helps people process difficult emotions."),
        doc("movement.txt", "Gentle exercise like walking can lift a low mood."),
        doc(
            "grounding.txt",
            "Grounding techniques bring attention back to the present moment.",
        ),
    ]
}

async fn open_store(
    db_path: &Path,
    embedder: &Arc<dyn EmbeddingProvider>,
) -> SqliteChunkStore<ProviderEmbeddingModel> {
    let model = ProviderEmbeddingModel::new(embedder.clone());
    SqliteChunkStore::create(db_path, &model).await.unwrap()
}

/// One chunk per document keeps ranking assertions readable.
fn one_chunk_config() -> ChunkerConfig {
    ChunkerConfig::new(1000, 200).unwrap()
}

#[tokio::test]
async fn indexed_text_is_its_own_best_match() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    build_index(
        wellness_corpus(),
        embedder.clone(),
        &store,
        one_chunk_config(),
        Path::new("corpus"),
    )
    .await
    .unwrap();

    let retriever = Retriever::new(embedder, Arc::new(store), 1);
    let hits = retriever
        .retrieve("A regular sleep schedule supports emotional stability.")
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source(), "sleep.txt");
    assert!(hits[0].score > 0.99, "exact text should score ~1, got {}", hits[0].score);
}

#[tokio::test]
async fn retrieval_respects_the_k_bound() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    build_index(
        wellness_corpus(),
        embedder.clone(),
        &store,
        one_chunk_config(),
        Path::new("corpus"),
    )
    .await
    .unwrap();

    let store: Arc<dyn Backend> = Arc::new(store);
    let hits = Retriever::new(embedder.clone(), store.clone(), 3)
        .retrieve("how do I feel better?")
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);

    // More than the store holds: everything comes back, ranked.
    let hits = Retriever::new(embedder, store, 50)
        .retrieve("how do I feel better?")
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "results must be ranked");
    }
}

#[tokio::test]
async fn anxiety_query_surfaces_the_breathing_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    build_index(
        wellness_corpus(),
        embedder.clone(),
        &store,
        one_chunk_config(),
        Path::new("corpus"),
    )
    .await
    .unwrap();

    let retriever = Retriever::new(embedder, Arc::new(store), 3);
    let hits = retriever
        .retrieve("How can I calm down when anxious?")
        .await
        .unwrap();

    assert!(
        hits.iter()
            .any(|hit| hit.text() == "Deep breathing exercises can reduce anxiety."),
        "expected the breathing chunk in the top 3, got {:?}",
        hits.iter().map(|hit| hit.text()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn reindexing_replaces_the_store_contents() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    let first = build_index(
        wellness_corpus(),
        embedder.clone(),
        &store,
        one_chunk_config(),
        Path::new("corpus"),
    )
    .await
    .unwrap();
    let second = build_index(
        wellness_corpus(),
        embedder.clone(),
        &store,
        one_chunk_config(),
        Path::new("corpus"),
    )
    .await
    .unwrap();

    assert_eq!(first.chunks_written, second.chunks_written);
    assert_eq!(store.count().await.unwrap(), second.chunks_written);
}

#[tokio::test]
async fn long_documents_are_chunked_and_retrievable() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    let filler = "Routine and structure make difficult weeks easier to manage. ".repeat(10);
    let content = format!("{filler}Progressive muscle relaxation releases physical tension.");
    let report = build_index(
        vec![doc("guide.txt", &content)],
        embedder.clone(),
        &store,
        ChunkerConfig::new(120, 30).unwrap(),
        Path::new("corpus"),
    )
    .await
    .unwrap();
    assert!(report.chunks_written > 1);

    let retriever = Retriever::new(embedder, Arc::new(store), 2);
    let hits = retriever
        .retrieve("progressive muscle relaxation")
        .await
        .unwrap();
    assert!(hits
        .iter()
        .any(|hit| hit.text().contains("muscle relaxation")));
}

#[tokio::test]
async fn empty_corpus_fails_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();
    let store = open_store(&db_path, &embedder).await;

    let err = build_index(
        vec![doc("blank.txt", "")],
        embedder,
        &store,
        one_chunk_config(),
        Path::new("my-corpus"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SolaceError::EmptyCorpus { .. }));
}

#[tokio::test]
async fn opening_a_missing_index_fails_fast() {
    let embedder = embedder();
    let model = ProviderEmbeddingModel::new(embedder.clone());

    let err = SqliteChunkStore::open_existing(Path::new("/definitely/not/here.sqlite"), &model)
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::IndexNotFound { .. }));

    // A database that exists but holds zero chunks is just as unusable.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    open_store(&db_path, &embedder).await;
    let err = SqliteChunkStore::open_existing(&db_path, &model)
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::IndexNotFound { .. }));
}

#[tokio::test]
async fn reopened_index_serves_the_same_results() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.sqlite");
    let embedder = embedder();

    {
        let store = open_store(&db_path, &embedder).await;
        build_index(
            wellness_corpus(),
            embedder.clone(),
            &store,
            one_chunk_config(),
            Path::new("corpus"),
        )
        .await
        .unwrap();
    }

    let model = ProviderEmbeddingModel::new(embedder.clone());
    let reopened = SqliteChunkStore::open_existing(&db_path, &model)
        .await
        .unwrap();
    assert_eq!(reopened.count().await.unwrap(), 5);

    let retriever = Retriever::new(embedder, Arc::new(reopened), 1);
    let hits = retriever
        .retrieve("Journaling helps people process difficult emotions.")
        .await
        .unwrap();
    assert_eq!(hits[0].source(), "journaling.txt");
}
