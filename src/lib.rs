//! ```text
//! Corpus files ──► ingestion::loader ──► Document
//!                                          │
//! Document ──► ingestion::chunker ──► Chunk windows
//!                                          │
//! Chunks ──► embeddings (batch) ──► stores::sqlite::SqliteChunkStore
//!
//! Query ──► retrieval::Retriever ──► top-k ScoredChunk
//!                │                          │
//! session history┴──► composer::AnswerComposer ──► answer + sources
//!                              │
//!                    prompt::PersonaPolicy
//! ```
//!
//! The indexing half runs offline (`solace index`); the serving half runs
//! behind `server::build_router` (`solace serve`). Both sides share one
//! [`embeddings::EmbeddingProvider`] instance so query vectors live in the
//! same embedding space as the stored chunks.

pub mod composer;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod prompt;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod session;
pub mod stores;
pub mod types;

pub use composer::{AnswerComposer, ComposedAnswer};
pub use config::AppConfig;
pub use retrieval::{Retriever, ScoredChunk};
pub use session::{ConversationRegistry, ConversationSession, Role, Turn};
pub use types::SolaceError;
