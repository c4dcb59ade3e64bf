//! Core data models flowing through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One logical input unit (usually one file), produced by a document loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// A contiguous window of a document's text.
///
/// `chunk_id` is assigned by the store at insertion time unless the caller
/// set one; `embedding` is attached once, when the chunk is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Option<String>,
    pub text: String,
    pub source_id: String,
    /// Character offset of the window start within the source text.
    pub start_offset: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Metadata persisted next to each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_id: String,
    pub start_offset: usize,
    pub hash: String,
}

/// The persisted form of a [`Chunk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: RecordMetadata,
}

impl StoreRecord {
    /// Rebuild the chunk view of this record, embedding included.
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            chunk_id: Some(self.chunk_id.clone()),
            text: self.text.clone(),
            source_id: self.metadata.source_id.clone(),
            start_offset: self.metadata.start_offset,
            hash: self.metadata.hash.clone(),
            embedding: Some(self.embedding.clone()),
        }
    }
}

/// A scored search hit. Constructed per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

impl RetrievalResult {
    pub fn chunk_id(&self) -> &str {
        self.chunk.chunk_id.as_deref().unwrap_or_default()
    }
}

/// Lifecycle state of a persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing has ever been written at the configured location.
    Absent,
    /// The collection exists but holds zero records.
    Empty,
    /// The collection holds this many records.
    Populated(usize),
}

impl StoreState {
    pub fn from_count(count: Option<usize>) -> Self {
        match count {
            None => StoreState::Absent,
            Some(0) => StoreState::Empty,
            Some(n) => StoreState::Populated(n),
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            StoreState::Populated(n) => *n,
            _ => 0,
        }
    }
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreState::Absent => write!(f, "absent"),
            StoreState::Empty => write!(f, "empty"),
            StoreState::Populated(n) => write!(f, "populated ({} records)", n),
        }
    }
}
