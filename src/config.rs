//! Runtime configuration loaded from the environment.
//!
//! Every knob has a documented default so the service runs out of the box
//! against a local index; nothing is hard-coded to an absolute path. CLI
//! flags (see the `solace` binary) override these values after loading.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::SolaceError;

/// Default Groq OpenAI-compatible API root.
pub const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
/// Default Groq chat model.
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";

/// Application configuration for both the indexing and serving phases.
///
/// Environment variables (all optional unless noted):
///
/// | Variable | Default | Meaning |
/// |---|---|---|
/// | `SOLACE_INDEX_DIR` | `./index` | Directory holding the persisted index |
/// | `SOLACE_CORPUS` | `./corpus` | Corpus file or directory to ingest |
/// | `SOLACE_BIND` | `127.0.0.1:8000` | Server listen address |
/// | `SOLACE_ALLOWED_ORIGINS` | localhost:5173 pair | Comma-separated CORS origins |
/// | `GROQ_API_KEY` | — | Required for `serve`; checked at startup |
/// | `SOLACE_GROQ_URL` | Groq API root | OpenAI-compatible completions base |
/// | `SOLACE_GROQ_MODEL` | `llama3-70b-8192` | Chat model name |
/// | `SOLACE_EMBEDDINGS_URL` | — | OpenAI-compatible embeddings base; the deterministic local embedder is used when unset |
/// | `SOLACE_EMBEDDINGS_MODEL` | `all-MiniLM-L6-v2` | Embedding model name |
/// | `SOLACE_EMBEDDINGS_DIM` | `384` | Embedding dimensions of the remote model |
/// | `SOLACE_RETRIEVAL_K` | `3` | Top-k chunks per query |
/// | `SOLACE_CHUNK_SIZE` | `1000` | Chunk window size (graphemes) |
/// | `SOLACE_CHUNK_OVERLAP` | `200` | Window overlap (graphemes) |
/// | `SOLACE_REQUEST_TIMEOUT_MS` | `30000` | Deadline per external call |
/// | `SOLACE_RETRY_ATTEMPTS` | `3` | Attempts per external call |
/// | `SOLACE_RETRY_BASE_MS` | `200` | Initial backoff delay |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub index_dir: PathBuf,
    pub corpus_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub groq_api_key: Option<String>,
    pub groq_url: String,
    pub groq_model: String,
    pub embeddings_url: Option<String>,
    pub embeddings_model: String,
    pub embeddings_dimensions: usize,
    pub retrieval_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./index"),
            corpus_path: PathBuf::from("./corpus"),
            bind_addr: "127.0.0.1:8000".parse().expect("static addr"),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            groq_api_key: None,
            groq_url: DEFAULT_GROQ_URL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            embeddings_url: None,
            embeddings_model: "all-MiniLM-L6-v2".to_string(),
            embeddings_dimensions: 384,
            retrieval_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            request_timeout: Duration::from_millis(30_000),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SolaceError::Configuration`] when a variable is present
    /// but unparseable; absent variables fall back to defaults.
    pub fn from_env() -> Result<Self, SolaceError> {
        let mut config = Self::default();

        if let Some(dir) = read_var("SOLACE_INDEX_DIR") {
            config.index_dir = PathBuf::from(dir);
        }
        if let Some(path) = read_var("SOLACE_CORPUS") {
            config.corpus_path = PathBuf::from(path);
        }
        if let Some(addr) = read_var("SOLACE_BIND") {
            config.bind_addr = addr.parse().map_err(|_| {
                SolaceError::Configuration(format!("SOLACE_BIND is not a socket address: {addr}"))
            })?;
        }
        if let Some(origins) = read_var("SOLACE_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        config.groq_api_key = read_var("GROQ_API_KEY");
        if let Some(url) = read_var("SOLACE_GROQ_URL") {
            config.groq_url = url;
        }
        if let Some(model) = read_var("SOLACE_GROQ_MODEL") {
            config.groq_model = model;
        }
        config.embeddings_url = read_var("SOLACE_EMBEDDINGS_URL");
        if let Some(model) = read_var("SOLACE_EMBEDDINGS_MODEL") {
            config.embeddings_model = model;
        }
        config.embeddings_dimensions =
            read_parsed("SOLACE_EMBEDDINGS_DIM", config.embeddings_dimensions)?;
        config.retrieval_k = read_parsed("SOLACE_RETRIEVAL_K", config.retrieval_k)?;
        config.chunk_size = read_parsed("SOLACE_CHUNK_SIZE", config.chunk_size)?;
        config.chunk_overlap = read_parsed("SOLACE_CHUNK_OVERLAP", config.chunk_overlap)?;
        config.request_timeout = Duration::from_millis(read_parsed(
            "SOLACE_REQUEST_TIMEOUT_MS",
            config.request_timeout.as_millis() as u64,
        )?);
        config.retry_attempts = read_parsed("SOLACE_RETRY_ATTEMPTS", config.retry_attempts)?;
        config.retry_base_delay = Duration::from_millis(read_parsed(
            "SOLACE_RETRY_BASE_MS",
            config.retry_base_delay.as_millis() as u64,
        )?);

        Ok(config)
    }

    /// Startup check for the serving phase: credentials must be present.
    ///
    /// # Errors
    ///
    /// Returns [`SolaceError::Configuration`] when `GROQ_API_KEY` is
    /// missing or blank; the process must not accept traffic in that case.
    pub fn require_credentials(&self) -> Result<&str, SolaceError> {
        match self.groq_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(SolaceError::Configuration(
                "GROQ_API_KEY is not set; add it to the environment or .env file".to_string(),
            )),
        }
    }

    /// Path of the sqlite database inside the index directory.
    pub fn index_db_path(&self) -> PathBuf {
        self.index_dir.join("chunks.sqlite")
    }
}

fn read_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, SolaceError> {
    match read_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| SolaceError::Configuration(format!("{key} is not valid: {raw}"))),
        None => Ok(default),
    }
}
