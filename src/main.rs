use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use solace_rag::config::AppConfig;
use solace_rag::embeddings::{
    EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider, ProviderEmbeddingModel,
};
use solace_rag::ingestion::chunker::ChunkerConfig;
use solace_rag::ingestion::indexer::build_index;
use solace_rag::ingestion::loader::load_corpus;
use solace_rag::retry::RetryPolicy;
use solace_rag::server;
use solace_rag::stores::SqliteChunkStore;
use solace_rag::types::SolaceError;

#[derive(Parser)]
#[command(name = "solace", version, about = "Retrieval-augmented mental-health support assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the chunk index from a corpus file or directory.
    Index {
        /// Corpus file or directory (overrides SOLACE_CORPUS).
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Directory to write the index into (overrides SOLACE_INDEX_DIR).
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Chunk window size in graphemes (overrides SOLACE_CHUNK_SIZE).
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Window overlap in graphemes (overrides SOLACE_CHUNK_OVERLAP).
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Serve the chat endpoint over an existing index.
    Serve {
        /// Directory holding the index (overrides SOLACE_INDEX_DIR).
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Listen address (overrides SOLACE_BIND).
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<(), SolaceError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command {
        Command::Index {
            corpus,
            index_dir,
            chunk_size,
            overlap,
        } => {
            if let Some(corpus) = corpus {
                config.corpus_path = corpus;
            }
            if let Some(dir) = index_dir {
                config.index_dir = dir;
            }
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                config.chunk_overlap = overlap;
            }
            run_index(&config).await
        }
        Command::Serve { index_dir, bind } => {
            if let Some(dir) = index_dir {
                config.index_dir = dir;
            }
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            server::run(config).await
        }
    }
}

async fn run_index(config: &AppConfig) -> Result<(), SolaceError> {
    let chunker = ChunkerConfig::new(config.chunk_size, config.chunk_overlap)?;
    let embedder = build_embedder(config)?;

    let documents = load_corpus(&config.corpus_path).await?;
    println!(
        "Loaded {} document(s) from {}",
        documents.len(),
        config.corpus_path.display()
    );

    let model = ProviderEmbeddingModel::new(embedder.clone());
    let db_path = config.index_db_path();
    let store = SqliteChunkStore::create(&db_path, &model).await?;

    let report = build_index(documents, embedder, &store, chunker, &config.corpus_path).await?;

    println!("Indexing complete:");
    println!("  documents indexed: {}", report.documents_indexed);
    println!("  documents skipped: {}", report.documents_skipped);
    println!("  chunks written   : {}", report.chunks_written);
    println!("  index database   : {}", db_path.display());
    Ok(())
}

fn build_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>, SolaceError> {
    let embedder: Arc<dyn EmbeddingProvider> = match &config.embeddings_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("solace-rag/", env!("CARGO_PKG_VERSION")))
                .timeout(config.request_timeout)
                .use_rustls_tls()
                .build()?;
            Arc::new(HttpEmbeddingProvider::new(
                client,
                url.clone(),
                config.embeddings_model.clone(),
                config.embeddings_dimensions,
                RetryPolicy::new(config.retry_attempts, config.retry_base_delay),
            ))
        }
        None => Arc::new(MockEmbeddingProvider::new()),
    };
    Ok(embedder)
}
