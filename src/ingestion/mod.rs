//! Turning a document corpus into a persisted, queryable chunk index.
//!
//! * [`loader`] — reads pdf/txt/md sources from a file or directory.
//! * [`chunker`] — sliding-window chunking with overlap and provenance.
//! * [`indexer`] — the load → chunk → embed → persist pipeline.

pub mod chunker;
pub mod indexer;
pub mod loader;

pub use chunker::{Chunk, ChunkerConfig, Chunks};
pub use indexer::{build_index, IndexReport};
pub use loader::{load_corpus, Document};
