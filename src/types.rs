//! Shared error taxonomy for the indexing and serving pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced anywhere in the retrieval-augmented pipeline.
///
/// The variants mirror the failure boundaries of the system: indexing
/// aborts on [`SolaceError::EmptyCorpus`], startup aborts on
/// [`SolaceError::IndexNotFound`] and [`SolaceError::Configuration`], and
/// request handling converts [`SolaceError::Retrieval`] /
/// [`SolaceError::Generation`] into a uniform degraded response without
/// leaking the underlying cause to the client.
#[derive(Debug, Error)]
pub enum SolaceError {
    /// The entire corpus produced zero chunks; fatal to an indexing run.
    #[error("corpus at {path} produced no indexable chunks")]
    EmptyCorpus {
        /// Corpus path that was scanned.
        path: PathBuf,
    },

    /// The persisted index is missing or empty; fatal to process startup.
    #[error("no index found at {path}; run `solace index` first")]
    IndexNotFound {
        /// Expected index location.
        path: PathBuf,
    },

    /// Transient failure reaching the embedder or the index store.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The language-model call failed or timed out.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Missing or invalid configuration; fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Underlying storage failure (sqlite, filesystem).
    #[error("storage error: {0}")]
    Storage(String),

    /// A source document could not be read or parsed.
    #[error("invalid document {path}: {reason}")]
    InvalidDocument {
        /// Offending document path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Which external call timed out.
        operation: &'static str,
        /// Configured deadline.
        millis: u64,
    },

    /// Invalid chunking parameters.
    #[error("invalid chunking config: {0}")]
    Chunking(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl SolaceError {
    /// Whether this error should be retried by callers with a retry budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SolaceError::Retrieval(_)
                | SolaceError::Generation(_)
                | SolaceError::Timeout { .. }
                | SolaceError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_failure_surface() {
        let err = SolaceError::IndexNotFound {
            path: PathBuf::from("/tmp/index"),
        };
        assert!(err.to_string().contains("/tmp/index"));
        assert!(err.to_string().contains("solace index"));
    }

    #[test]
    fn transient_classification() {
        assert!(SolaceError::Retrieval("boom".into()).is_transient());
        assert!(SolaceError::Timeout {
            operation: "embed",
            millis: 100
        }
        .is_transient());
        assert!(!SolaceError::Configuration("missing key".into()).is_transient());
        assert!(!SolaceError::EmptyCorpus {
            path: PathBuf::from("docs")
        }
        .is_transient());
    }
}
