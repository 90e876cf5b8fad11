//! Corpus loading: reads source documents from a file or directory.
//!
//! Supported formats: `.pdf` (text extraction on the blocking pool),
//! `.txt`, and `.md`. Documents that cannot be read or contain no text are
//! skipped with a warning rather than aborting the run; the indexer decides
//! whether the corpus as a whole was empty.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use walkdir::WalkDir;

use crate::types::SolaceError;

/// A raw source document, immutable and discarded after chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Path-derived identifier, carried through to retrieval attributions.
    pub source_id: String,
    /// Linearized text content.
    pub content: String,
}

/// Loads all supported documents under `path` (a single file or a
/// directory walked recursively, in deterministic name order).
///
/// # Errors
///
/// Returns [`SolaceError::InvalidDocument`] when `path` itself does not
/// exist. Per-document read failures are logged and skipped.
pub async fn load_corpus(path: &Path) -> Result<Vec<Document>, SolaceError> {
    if !path.exists() {
        return Err(SolaceError::InvalidDocument {
            path: path.to_path_buf(),
            reason: "path does not exist".to_string(),
        });
    }

    let files: Vec<PathBuf> = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    };

    let mut documents = Vec::new();
    for file in files {
        match load_document(&file).await {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(path = %file.display(), error = %err, "skipping unreadable document");
            }
        }
    }

    Ok(documents)
}

/// Reads one document, returning `None` for unsupported or empty files.
async fn load_document(path: &Path) -> Result<Option<Document>, SolaceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let content = match extension.as_deref() {
        Some("txt") | Some("md") => fs::read_to_string(path).await?,
        Some("pdf") => extract_pdf_text(path).await?,
        other => {
            tracing::debug!(
                path = %path.display(),
                extension = other.unwrap_or("none"),
                "ignoring unsupported file type"
            );
            return Ok(None);
        }
    };

    if content.trim().is_empty() {
        tracing::warn!(path = %path.display(), "document contains no text, skipping");
        return Ok(None);
    }

    Ok(Some(Document {
        source_id: path.display().to_string(),
        content,
    }))
}

/// PDF extraction is CPU-bound, so it runs on the blocking pool.
async fn extract_pdf_text(path: &Path) -> Result<String, SolaceError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&owned).map_err(|err| SolaceError::InvalidDocument {
            path: owned.clone(),
            reason: err.to_string(),
        })
    })
    .await
    .map_err(|err| SolaceError::InvalidDocument {
        path: path.to_path_buf(),
        reason: format!("pdf extraction task failed: {err}"),
    })?
}
