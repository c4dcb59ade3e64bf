//! In-memory [`VectorStore`] implementation for tests and embedding hosts.
//!
//! The collection is an immutable snapshot behind `std::sync::RwLock`.
//! Searches clone the `Arc` and score without holding the lock; writers
//! serialize on a mutex, build the next snapshot and swap it in, so a
//! concurrent search sees either the whole batch or none of it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::embedding::Similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievalResult, StoreRecord, StoreState};

use super::{check_search_args, prepare_records, rank_records, VectorStore};

#[derive(Debug, Default)]
struct Snapshot {
    dims: Option<usize>,
    records: Vec<StoreRecord>,
}

/// In-memory store. Starts *absent*; the first non-empty insert creates it.
pub struct InMemoryStore {
    similarity: Similarity,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    writer: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_similarity(Similarity::Cosine)
    }

    pub fn with_similarity(similarity: Similarity) -> Self {
        Self {
            similarity,
            snapshot: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    fn current(&self) -> Result<Option<Arc<Snapshot>>> {
        self.snapshot
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| Error::store_io("in-memory store lock poisoned"))
    }

    fn publish(&self, next: Option<Arc<Snapshot>>) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| Error::store_io("in-memory store lock poisoned"))?;
        *guard = next;
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| Error::store_io("in-memory store lock poisoned"))?;

        let current = self.current()?;
        let (dims, existing) = match current.as_deref() {
            Some(snap) => (snap.dims, snap.records.as_slice()),
            None => (None, &[][..]),
        };
        let mut taken: HashSet<String> = existing.iter().map(|r| r.chunk_id.clone()).collect();
        let new_records = prepare_records(chunks, embeddings, dims, &mut taken)?;
        if new_records.is_empty() {
            return Ok(0);
        }

        let inserted = new_records.len();
        let mut records = existing.to_vec();
        records.extend(new_records);
        let dims = dims.or_else(|| records.first().map(|r| r.embedding.len()));
        self.publish(Some(Arc::new(Snapshot { dims, records })))?;

        tracing::debug!(inserted, "in-memory insert");
        Ok(inserted)
    }

    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| Error::store_io("in-memory store lock poisoned"))?;

        let mut taken = HashSet::new();
        let records = prepare_records(chunks, embeddings, None, &mut taken)?;
        let inserted = records.len();
        let dims = records.first().map(|r| r.embedding.len());
        self.publish(Some(Arc::new(Snapshot { dims, records })))?;

        tracing::debug!(inserted, "in-memory replace");
        Ok(inserted)
    }

    async fn clear(&self) -> Result<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| Error::store_io("in-memory store lock poisoned"))?;
        if self.current()?.is_some() {
            self.publish(Some(Arc::new(Snapshot::default())))?;
        }
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let Some(snap) = self.current()? else {
            return Ok(Vec::new());
        };
        if snap.records.is_empty() {
            return Ok(Vec::new());
        }
        check_search_args(query_embedding, k, snap.dims)?;
        Ok(rank_records(&snap.records, query_embedding, k, self.similarity))
    }

    async fn state(&self) -> Result<StoreState> {
        Ok(StoreState::from_count(
            self.current()?.map(|snap| snap.records.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn paris() -> Vec<Chunk> {
        chunk_text("facts.txt", "Paris is the capital of France.", 100, 0).unwrap()
    }

    #[tokio::test]
    async fn test_absent_and_empty_search_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.state().await.unwrap(), StoreState::Absent);
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());

        store.clear().await.unwrap();
        assert_eq!(store.state().await.unwrap(), StoreState::Absent);
    }

    #[tokio::test]
    async fn test_insert_then_search_paris() {
        let store = InMemoryStore::new();
        let n = store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.state().await.unwrap(), StoreState::Populated(1));

        let results = store.search(&[0.9, 0.1], 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.994).abs() < 1e-3);
        assert_eq!(results[0].chunk.text, "Paris is the capital of France.");
        assert_eq!(results[0].chunk.embedding, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_clear_leaves_present_empty_and_is_idempotent() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.state().await.unwrap(), StoreState::Empty);
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_without_partial_write() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();

        let chunks = chunk_text("b.txt", "one two three", 5, 0).unwrap();
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 1.0]];
        let err = store.insert(&chunks, &embeddings).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reinsert_same_source_keeps_both() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id()).collect();
        assert_eq!(
            ids,
            vec!["facts.txt:0000000000", "facts.txt:0000000000#1"]
        );
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_collection() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();

        let chunks = chunk_text("b.txt", "one two three", 5, 0).unwrap();
        let embeddings = vec![vec![0.0, 0.0, 1.0]; chunks.len()];
        let n = store.replace(&chunks, &embeddings).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(store.state().await.unwrap(), StoreState::Populated(3));
        let results = store.search(&[0.0, 0.0, 1.0], 5).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.source_id == "b.txt"));

        // An invalid batch keeps the previous contents
        let err = store
            .replace(&chunks[..1], &[vec![f32::NAN, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(store.count().await.unwrap(), 3);

        store.replace(&[], &[]).await.unwrap();
        assert_eq!(store.state().await.unwrap(), StoreState::Empty);
    }

    #[tokio::test]
    async fn test_insert_rejects_nan_without_partial_write() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        let chunks = chunk_text("b.txt", "one two three", 5, 0).unwrap();
        let embeddings = vec![vec![1.0, 0.0], vec![f32::NAN, 0.0], vec![0.0, 1.0]];
        assert!(store.insert(&chunks, &embeddings).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.iter().all(|r| r.score.is_finite()));
    }

    #[tokio::test]
    async fn test_search_query_dimension_mismatch() {
        let store = InMemoryStore::new();
        store.insert(&paris(), &[vec![1.0, 0.0]]).await.unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0], 1).await.is_err());
    }
}
