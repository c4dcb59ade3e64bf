//! Vector store abstraction for PDF Agent.
//!
//! The [`VectorStore`] trait is the durable home of chunk records and the
//! only place similarity search happens. Backends (SQLite in the app crate,
//! [`memory::InMemoryStore`] here) share the record preparation and ranking
//! helpers in this module so that id assignment, dimensionality checks and
//! result ordering are identical everywhere.
//!
//! # Concurrency contract
//!
//! Implementations are single-writer, multiple-reader: `insert`, `replace`
//! and `clear` exclude each other and any in-flight `search`; searches may
//! run in parallel. An `insert` or `replace` is all-or-nothing from the point
//! of view of a concurrent `search` or writer.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](VectorStore::insert) | Durably add chunks with their embeddings |
//! | [`replace`](VectorStore::replace) | Discard the collection and insert a batch, atomically |
//! | [`clear`](VectorStore::clear) | Discard the whole collection |
//! | [`search`](VectorStore::search) | Exact top-k similarity search |
//! | [`state`](VectorStore::state) | Absent / empty / populated |

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::chunk::derive_chunk_id;
use crate::embedding::Similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, RecordMetadata, RetrievalResult, StoreRecord, StoreState};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `chunks` with their `embeddings` (same length, same order).
    ///
    /// Chunks without a `chunk_id` get a derived one; ids that collide with
    /// stored records receive a `#n` suffix, so repeated ingestion of the
    /// same source adds distinct records. Returns the number inserted once
    /// the batch is durable.
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Discard every record and insert `chunks` in their place, under one
    /// write lock. No other writer can interleave, so the collection ends up
    /// holding exactly this batch. An invalid batch leaves the previous
    /// records untouched. Dimensionality is taken from the new batch.
    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Irrecoverably discard every record. Idempotent.
    async fn clear(&self) -> Result<()>;

    /// Exact top-`k` search, ordered by score descending then `chunk_id`
    /// ascending. Absent or empty stores yield an empty vector.
    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    /// Current lifecycle state of the collection.
    async fn state(&self) -> Result<StoreState>;

    async fn count(&self) -> Result<usize> {
        Ok(self.state().await?.record_count())
    }
}

/// Pick the first free id for `base`: `base` itself, then `base#1`, `base#2`, …
pub fn unique_chunk_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}#{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Turn a chunk/embedding batch into records ready to persist.
///
/// Checks the batch lengths match and that every embedding is finite with
/// the collection's dimensionality (or, for a fresh collection, the batch's
/// own). Assigns unique ids against `taken`, which is extended with the new
/// ids. Nothing is returned unless the whole batch is valid.
pub fn prepare_records(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    collection_dims: Option<usize>,
    taken: &mut HashSet<String>,
) -> Result<Vec<StoreRecord>> {
    if chunks.len() != embeddings.len() {
        return Err(Error::Configuration(format!(
            "insert called with {} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }

    let expected = match (collection_dims, embeddings.first()) {
        (Some(d), _) => d,
        (None, Some(first)) => first.len(),
        (None, None) => return Ok(Vec::new()),
    };
    if expected == 0 {
        return Err(Error::Embedding("embedding vectors must not be empty".into()));
    }

    let mut records = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        if embedding.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        let base = chunk
            .chunk_id
            .clone()
            .unwrap_or_else(|| derive_chunk_id(&chunk.source_id, chunk.start_offset));
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(Error::Embedding(format!(
                "embedding for {} contains non-finite values",
                base
            )));
        }
        let chunk_id = unique_chunk_id(&base, taken);
        taken.insert(chunk_id.clone());
        records.push(StoreRecord {
            chunk_id,
            embedding: embedding.clone(),
            text: chunk.text.clone(),
            metadata: RecordMetadata {
                source_id: chunk.source_id.clone(),
                start_offset: chunk.start_offset,
                hash: chunk.hash.clone(),
            },
        });
    }
    Ok(records)
}

/// Exact brute-force ranking over `records`.
///
/// Scores every record, sorts by score descending with ties broken by
/// ascending `chunk_id`, and keeps the first `k`.
pub fn rank_records<'a, I>(
    records: I,
    query: &[f32],
    k: usize,
    similarity: Similarity,
) -> Vec<RetrievalResult>
where
    I: IntoIterator<Item = &'a StoreRecord>,
{
    let mut scored: Vec<(f32, &StoreRecord)> = records
        .into_iter()
        .map(|r| (similarity.score(query, &r.embedding), r))
        .collect();

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, record)| RetrievalResult {
            chunk: record.to_chunk(),
            score,
        })
        .collect()
}

/// Validate search arguments against the collection's dimensionality.
pub fn check_search_args(query: &[f32], k: usize, collection_dims: Option<usize>) -> Result<()> {
    if k == 0 {
        return Err(Error::Configuration("search k must be > 0".into()));
    }
    match collection_dims {
        Some(d) if d != query.len() => Err(Error::DimensionMismatch {
            expected: d,
            actual: query.len(),
        }),
        _ => Ok(()),
    }
}
