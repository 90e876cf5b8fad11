//! Sliding-window chunking over a document's linearized text.
//!
//! Windows are aligned to grapheme boundaries so multi-byte text is never
//! split mid-glyph. Adjacent windows from the same document share an
//! `overlap`-sized tail/head so no semantic boundary is cut without
//! surrounding context.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::ingestion::loader::Document;
use crate::types::SolaceError;

/// Window parameters for the chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in graphemes.
    pub chunk_size: usize,
    /// Graphemes shared between adjacent chunks; must be `< chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Builds a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SolaceError::Chunking`] when `chunk_size` is zero or the
    /// overlap is not strictly smaller than the window.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SolaceError> {
        if chunk_size == 0 {
            return Err(SolaceError::Chunking("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(SolaceError::Chunking(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// How far the window start advances between chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A contiguous text span cut from a source document.
///
/// Immutable once produced; ownership passes to the index store at
/// persistence time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The window text; at most `chunk_size` graphemes.
    pub text: String,
    /// Byte offset of the window start within the source document.
    pub start_offset: usize,
    /// Identifier of the originating document.
    pub source_id: String,
    /// Zero-based position of this chunk within its document.
    pub sequence_index: usize,
}

/// Lazy iterator over a document's chunks.
pub struct Chunks<'a> {
    doc: &'a Document,
    /// Byte offsets of grapheme boundaries, including the terminal offset.
    boundaries: Vec<usize>,
    config: ChunkerConfig,
    next_start: usize,
    sequence: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(doc: &'a Document, config: ChunkerConfig) -> Self {
        let mut boundaries: Vec<usize> = doc
            .content
            .grapheme_indices(true)
            .map(|(offset, _)| offset)
            .collect();
        boundaries.push(doc.content.len());
        Self {
            doc,
            boundaries,
            config,
            next_start: 0,
            sequence: 0,
            done: false,
        }
    }

    fn grapheme_count(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let total = self.grapheme_count();
        if self.done || self.next_start >= total {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.config.chunk_size).min(total);
        let byte_start = self.boundaries[start];
        let byte_end = self.boundaries[end];

        let chunk = Chunk {
            text: self.doc.content[byte_start..byte_end].to_string(),
            start_offset: byte_start,
            source_id: self.doc.source_id.clone(),
            sequence_index: self.sequence,
        };
        self.sequence += 1;

        if end == total {
            self.done = true;
        } else {
            self.next_start = start + self.config.step();
        }

        Some(chunk)
    }
}

/// Chunks `doc` lazily under `config`.
pub fn chunk_document(doc: &Document, config: ChunkerConfig) -> Chunks<'_> {
    Chunks::new(doc, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> Document {
        Document {
            source_id: "test.txt".to_string(),
            content: content.to_string(),
        }
    }

    fn graphemes(text: &str) -> Vec<&str> {
        text.graphemes(true).collect()
    }

    #[test]
    fn rejects_overlap_not_smaller_than_window() {
        assert!(ChunkerConfig::new(100, 100).is_err());
        assert!(ChunkerConfig::new(100, 150).is_err());
        assert!(ChunkerConfig::new(0, 0).is_err());
        assert!(ChunkerConfig::new(100, 99).is_ok());
    }

    #[test]
    fn short_document_yields_one_full_chunk() {
        let config = ChunkerConfig::new(50, 10).unwrap();
        let d = doc("a short document");
        let chunks: Vec<_> = chunk_document(&d, config).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a short document");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn document_exactly_window_sized_yields_one_chunk() {
        let config = ChunkerConfig::new(10, 4).unwrap();
        let d = doc("0123456789");
        let chunks: Vec<_> = chunk_document(&d, config).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "0123456789");
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let config = ChunkerConfig::default();
        let d = doc("");
        assert_eq!(chunk_document(&d, config).count(), 0);
    }

    #[test]
    fn consecutive_chunks_overlap_exactly() {
        let config = ChunkerConfig::new(10, 3).unwrap();
        let text: String = ('a'..='z').collect();
        let d = doc(&text);
        let chunks: Vec<_> = chunk_document(&d, config).collect();
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev = graphemes(&pair[0].text);
            let next = graphemes(&pair[1].text);
            let tail: Vec<_> = prev[prev.len() - config.overlap..].to_vec();
            let head: Vec<_> = next[..config.overlap].to_vec();
            assert_eq!(tail, head, "adjacent chunks must share the overlap region");
        }
    }

    #[test]
    fn chunk_spans_cover_the_document_without_gaps() {
        let config = ChunkerConfig::new(7, 2).unwrap();
        let text = "the quick brown fox jumps over the lazy dog";
        let d = doc(text);
        let chunks: Vec<_> = chunk_document(&d, config).collect();

        let mut covered_to = 0usize;
        for chunk in &chunks {
            assert!(
                chunk.start_offset <= covered_to,
                "gap before offset {}",
                chunk.start_offset
            );
            covered_to = covered_to.max(chunk.start_offset + chunk.text.len());
        }
        assert_eq!(covered_to, text.len());
    }

    #[test]
    fn chunks_respect_the_size_bound() {
        let config = ChunkerConfig::new(12, 5).unwrap();
        let d = doc(&"lorem ipsum dolor sit amet ".repeat(8));
        for chunk in chunk_document(&d, config) {
            assert!(graphemes(&chunk.text).len() <= config.chunk_size);
        }
    }

    #[test]
    fn windows_never_split_multibyte_graphemes() {
        let config = ChunkerConfig::new(4, 1).unwrap();
        let d = doc("héllo wörld 🦀 done");
        let chunks: Vec<_> = chunk_document(&d, config).collect();
        // Every chunk must be valid UTF-8 slicing (implicit) and re-joinable.
        for chunk in &chunks {
            assert_eq!(
                &d.content[chunk.start_offset..chunk.start_offset + chunk.text.len()],
                chunk.text
            );
        }
    }

    #[test]
    fn sequence_indices_are_ordered_and_dense() {
        let config = ChunkerConfig::new(5, 2).unwrap();
        let d = doc("abcdefghijklmnopqrstuvwxyz");
        for (expected, chunk) in chunk_document(&d, config).enumerate() {
            assert_eq!(chunk.sequence_index, expected);
        }
    }
}
