//! Overlapping fixed-window text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! Each window after the first starts `chunk_size - overlap` characters after
//! the previous one, so consecutive chunks share `overlap` characters. The
//! final window keeps whatever text remains, even if shorter.
//!
//! Lengths and offsets are counted in Unicode scalar values (`char`s), never
//! bytes, so windows always fall on valid UTF-8 boundaries.
//!
//! # Algorithm
//!
//! 1. Validate `chunk_size > 0` and `overlap < chunk_size` ([`ChunkParams::new`]).
//! 2. Empty text yields no chunks.
//! 3. Starting at offset 0, emit `text[start .. min(start + chunk_size, len)]`.
//! 4. Stop once a window reaches the end of the text; otherwise advance
//!    `start` by the step `chunk_size - overlap`.
//!
//! Every chunk carries its `start_offset` and a SHA-256 hash of its text.
//!
//! # Example
//!
//! ```rust
//! use pdf_agent_core::chunk::{chunk_document, ChunkParams};
//! use pdf_agent_core::models::Document;
//!
//! let doc = Document::new("notes.txt", "abcdefghij");
//! let params = ChunkParams::new(4, 1).unwrap();
//! let chunks = chunk_document(&doc, &params);
//! let offsets: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
//! assert_eq!(offsets, vec![0, 3, 6]);
//! assert_eq!(chunks[2].text, "ghij");
//! ```

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Validated window size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Validate chunking parameters.
    ///
    /// Invalid combinations are reported as [`Error::Configuration`], never
    /// clamped.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split a document into overlapping windows.
///
/// Pure and deterministic: the same document and parameters always produce
/// the same sequence. Chunks are returned in ascending `start_offset` order
/// with `chunk_id` unset.
pub fn chunk_document(doc: &Document, params: &ChunkParams) -> Vec<Chunk> {
    if doc.text.is_empty() {
        return Vec::new();
    }

    // Byte index of every char start, plus the end of the string.
    let boundaries: Vec<usize> = doc
        .text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(doc.text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(char_len / params.step() + 1);
    let mut start = 0;
    loop {
        let end = (start + params.chunk_size).min(char_len);
        let text = &doc.text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(&doc.source_id, start, text));
        if end == char_len {
            break;
        }
        start += params.step();
    }

    chunks
}

/// Convenience wrapper: validate parameters and chunk raw text.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    Ok(chunk_document(&Document::new(source_id, text), &params))
}

/// Base identifier for a chunk: source plus zero-padded offset, so that
/// lexicographic id order follows document order.
pub fn derive_chunk_id(source_id: &str, start_offset: usize) -> String {
    format!("{}:{:010}", source_id, start_offset)
}

/// SHA-256 of a chunk's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(source_id: &str, start_offset: usize, text: &str) -> Chunk {
    Chunk {
        chunk_id: None,
        text: text.to_string(),
        source_id: source_id.to_string(),
        start_offset,
        hash: content_hash(text),
        embedding: None,
    }
}
