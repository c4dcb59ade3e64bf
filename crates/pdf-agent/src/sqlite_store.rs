//! SQLite-backed [`VectorStore`] implementation.
//!
//! A collection is the database file `<store.path>/<collection>.sqlite`.
//! Until something is inserted there is no file and the store is *absent*;
//! searching it returns nothing and creates nothing.
//!
//! The pool sits behind a `tokio::sync::RwLock`: `insert`, `clear` and
//! `reload` take the write side, `search` and `state` the read side. Each
//! insert is a single transaction, so a failed batch persists nothing and a
//! concurrent search never sees half a batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use pdf_agent_core::embedding::{blob_to_vec, vec_to_blob, Similarity};
use pdf_agent_core::models::{Chunk, RecordMetadata, RetrievalResult, StoreRecord, StoreState};
use pdf_agent_core::store::{check_search_args, prepare_records, rank_records, VectorStore};
use pdf_agent_core::{Error, Result};

use crate::config::StoreConfig;
use crate::db;
use crate::migrate;

/// Persistent vector store for one named collection.
pub struct SqliteVectorStore {
    db_path: PathBuf,
    similarity: Similarity,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteVectorStore {
    /// Open the collection described by `config`, loading whatever was last
    /// durably written. A collection that was never written stays absent.
    pub async fn open(config: &StoreConfig, similarity: Similarity) -> Result<Self> {
        let store = Self {
            db_path: collection_path(config),
            similarity,
            pool: RwLock::new(None),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Database file backing this collection.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Drop the in-process handle and reopen from disk, exactly as a fresh
    /// process would.
    pub async fn reload(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
        if self.db_path.exists() {
            *guard = Some(open_pool(&self.db_path, false).await?);
            tracing::debug!(path = %self.db_path.display(), "loaded collection");
        }
        Ok(())
    }

    /// Close the pool, flushing the WAL.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }
}

/// `<store.path>/<collection>.sqlite`
pub fn collection_path(config: &StoreConfig) -> PathBuf {
    config.path.join(format!("{}.sqlite", config.collection))
}

async fn open_pool(path: &Path, create: bool) -> Result<SqlitePool> {
    let pool = db::connect(path, create)
        .await
        .map_err(|e| Error::store_io(format!("{:#}", e)))?;
    migrate::run_migrations(&pool)
        .await
        .map_err(|e| Error::store_io(format!("{:#}", e)))?;
    Ok(pool)
}

async fn read_dims(pool: &SqlitePool) -> Result<Option<usize>> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM collection_meta WHERE key = 'dims'")
            .fetch_optional(pool)
            .await
            .map_err(Error::store_io)?;
    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| Error::store_io(format!("corrupt dims value '{}'", v)))
        })
        .transpose()
}

async fn read_ids(pool: &SqlitePool) -> Result<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT chunk_id FROM records")
        .fetch_all(pool)
        .await
        .map_err(Error::store_io)?;
    Ok(ids.into_iter().collect())
}

async fn read_records(pool: &SqlitePool, dims: Option<usize>) -> Result<Vec<StoreRecord>> {
    let rows = sqlx::query(
        "SELECT chunk_id, source_id, start_offset, text, hash, embedding FROM records ORDER BY seq",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::store_io)?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let chunk_id: String = row.try_get("chunk_id").map_err(Error::store_io)?;
        let start_offset: i64 = row.try_get("start_offset").map_err(Error::store_io)?;
        let blob: Vec<u8> = row.try_get("embedding").map_err(Error::store_io)?;
        let embedding = blob_to_vec(&blob);
        if dims.is_some_and(|d| d != embedding.len()) || blob.len() % 4 != 0 {
            return Err(Error::store_io(format!(
                "record {} has a corrupt embedding ({} bytes)",
                chunk_id,
                blob.len()
            )));
        }
        records.push(StoreRecord {
            embedding,
            text: row.try_get("text").map_err(Error::store_io)?,
            metadata: RecordMetadata {
                source_id: row.try_get("source_id").map_err(Error::store_io)?,
                start_offset: usize::try_from(start_offset).map_err(Error::store_io)?,
                hash: row.try_get("hash").map_err(Error::store_io)?,
            },
            chunk_id,
        });
    }
    Ok(records)
}

/// Write `records` in one transaction. With `replace`, existing records and
/// the stored dimensionality are deleted first, inside the same transaction.
async fn write_records(
    pool: &SqlitePool,
    records: &[StoreRecord],
    new_dims: Option<usize>,
    replace: bool,
) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    if replace {
        sqlx::query("DELETE FROM records").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM collection_meta WHERE key = 'dims'")
            .execute(&mut *tx)
            .await?;
    }

    if let Some(dims) = new_dims {
        sqlx::query("INSERT OR REPLACE INTO collection_meta (key, value) VALUES ('dims', ?)")
            .bind(dims.to_string())
            .execute(&mut *tx)
            .await?;
    }

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO records (chunk_id, source_id, start_offset, text, hash, dims, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.chunk_id)
        .bind(&record.metadata.source_id)
        .bind(record.metadata.start_offset as i64)
        .bind(&record.text)
        .bind(&record.metadata.hash)
        .bind(record.embedding.len() as i64)
        .bind(vec_to_blob(&record.embedding))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::store_io(format!(
            "failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut guard = self.pool.write().await;

        let (dims, mut taken) = match guard.as_ref() {
            Some(pool) => (read_dims(pool).await?, read_ids(pool).await?),
            None => (None, HashSet::new()),
        };
        let records = prepare_records(chunks, embeddings, dims, &mut taken)?;
        if records.is_empty() {
            return Ok(0);
        }

        if guard.is_none() {
            tracing::info!(path = %self.db_path.display(), "creating collection");
            *guard = Some(open_pool(&self.db_path, true).await?);
        }
        let pool = guard
            .as_ref()
            .ok_or_else(|| Error::store_io("collection pool unavailable"))?;

        let new_dims = match dims {
            Some(_) => None,
            None => records.first().map(|r| r.embedding.len()),
        };
        write_records(pool, &records, new_dims, false)
            .await
            .map_err(Error::store_io)?;

        tracing::debug!(inserted = records.len(), "committed insert");
        Ok(records.len())
    }

    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut guard = self.pool.write().await;

        let records = prepare_records(chunks, embeddings, None, &mut HashSet::new())?;
        if guard.is_none() {
            if records.is_empty() {
                return Ok(0);
            }
            tracing::info!(path = %self.db_path.display(), "creating collection");
            *guard = Some(open_pool(&self.db_path, true).await?);
        }
        let pool = guard
            .as_ref()
            .ok_or_else(|| Error::store_io("collection pool unavailable"))?;

        let new_dims = records.first().map(|r| r.embedding.len());
        write_records(pool, &records, new_dims, true)
            .await
            .map_err(Error::store_io)?;

        tracing::info!(inserted = records.len(), "replaced collection");
        Ok(records.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }

        let base = self.db_path.as_os_str().to_owned();
        for suffix in ["", "-wal", "-shm"] {
            let mut name = base.clone();
            name.push(suffix);
            remove_if_exists(Path::new(&name))?;
        }
        tracing::info!(path = %self.db_path.display(), "cleared collection");
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let guard = self.pool.read().await;
        let Some(pool) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let dims = read_dims(pool).await?;
        let records = read_records(pool, dims).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        check_search_args(query_embedding, k, dims)?;
        Ok(rank_records(&records, query_embedding, k, self.similarity))
    }

    async fn state(&self) -> Result<StoreState> {
        let guard = self.pool.read().await;
        let Some(pool) = guard.as_ref() else {
            return Ok(StoreState::Absent);
        };
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(pool)
            .await
            .map_err(Error::store_io)?;
        Ok(StoreState::from_count(Some(count.max(0) as usize)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_agent_core::chunk::chunk_text;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_config(tmp: &TempDir) -> StoreConfig {
        StoreConfig {
            path: tmp.path().join("chroma"),
            collection: "test".to_string(),
        }
    }

    fn sample() -> (Vec<Chunk>, Vec<Vec<f32>>) {
        let mut chunks = chunk_text("geo.txt", "Paris is the capital of France.", 1000, 0).unwrap();
        chunks.extend(chunk_text("fox.txt", "The quick brown fox jumps over the lazy dog.", 20, 5).unwrap());
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.6, 0.8],
            vec![0.0, 1.0],
            vec![0.6, 0.8],
        ];
        (chunks, embeddings)
    }

    #[tokio::test]
    async fn test_absent_store_search_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = store_config(&tmp);
        let store = SqliteVectorStore::open(&config, Similarity::Cosine).await.unwrap();

        assert_eq!(store.state().await.unwrap(), StoreState::Absent);
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_insert_persists_and_reloads_identically() {
        let tmp = TempDir::new().unwrap();
        let config = store_config(&tmp);
        let (chunks, embeddings) = sample();

        let store = SqliteVectorStore::open(&config, Similarity::Cosine).await.unwrap();
        assert_eq!(store.insert(&chunks, &embeddings).await.unwrap(), 4);
        let before = store.search(&[0.9, 0.1], 3).await.unwrap();
        store.close().await;

        let fresh = SqliteVectorStore::open(&config, Similarity::Cosine).await.unwrap();
        assert_eq!(fresh.state().await.unwrap(), StoreState::Populated(4));
        let after = fresh.search(&[0.9, 0.1], 3).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].chunk.text, "Paris is the capital of France.");
        assert_eq!(after[0].chunk.source_id, "geo.txt");
    }

    #[tokio::test]
    async fn test_search_order_and_tie_break() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();

        let results = store.search(&[0.6, 0.8], 10).await.unwrap();
        assert_eq!(results.len(), 4);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                assert!(pair[0].chunk_id() < pair[1].chunk_id());
            }
        }
        assert_eq!(results[0].chunk_id(), "fox.txt:0000000000");
        assert_eq!(results[1].chunk_id(), "fox.txt:0000000030");
    }

    #[tokio::test]
    async fn test_append_without_clear_keeps_duplicates_distinct() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();
        store.insert(&chunks, &embeddings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 8);

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].chunk_id(), "geo.txt:0000000000");
        assert_eq!(results[1].chunk_id(), "geo.txt:0000000000#1");
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_allows_new_dims() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        store.clear().await.unwrap();

        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());

        let three_d: Vec<Vec<f32>> = embeddings.iter().map(|_| vec![1.0, 0.0, 0.0]).collect();
        assert_eq!(store.insert(&chunks, &three_d).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_replace_swaps_batch_and_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        let (chunks, embeddings) = sample();
        assert_eq!(store.replace(&chunks, &embeddings).await.unwrap(), 4);
        store.insert(&chunks, &embeddings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 8);

        let notes = chunk_text("notes.md", "Lyon is in France too.", 12, 2).unwrap();
        let three_d = vec![vec![0.0, 0.0, 1.0]; notes.len()];
        assert_eq!(store.replace(&notes, &three_d).await.unwrap(), 2);

        store.reload().await.unwrap();
        assert_eq!(store.state().await.unwrap(), StoreState::Populated(2));
        let results = store.search(&[0.0, 0.0, 1.0], 10).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.source_id == "notes.md"));
        assert_eq!(results[0].chunk_id(), "notes.md:0000000000");
    }

    #[tokio::test]
    async fn test_invalid_replace_keeps_previous_records() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();

        let err = store
            .replace(&chunks[..2], &[vec![1.0, 0.0], vec![1.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replaces_leave_exactly_one_batch() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
                .await
                .unwrap(),
        );
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();

        let notes = chunk_text("notes.md", "Lyon is in France too.", 12, 2).unwrap();
        let note_vectors = vec![vec![0.0, 1.0]; notes.len()];

        for _ in 0..5 {
            let a = {
                let store = Arc::clone(&store);
                let (chunks, embeddings) = (chunks.clone(), embeddings.clone());
                tokio::spawn(async move { store.replace(&chunks, &embeddings).await.unwrap() })
            };
            let b = {
                let store = Arc::clone(&store);
                let (notes, note_vectors) = (notes.clone(), note_vectors.clone());
                tokio::spawn(async move { store.replace(&notes, &note_vectors).await.unwrap() })
            };
            assert_eq!(a.await.unwrap(), 4);
            assert_eq!(b.await.unwrap(), 2);

            let results = store.search(&[1.0, 0.0], 100).await.unwrap();
            let sources: std::collections::BTreeSet<&str> =
                results.iter().map(|r| r.chunk.source_id.as_str()).collect();
            match results.len() {
                4 => assert!(!sources.contains("notes.md")),
                2 => assert_eq!(sources.into_iter().collect::<Vec<_>>(), vec!["notes.md"]),
                n => panic!("replaces interleaved: {} records", n),
            }
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_persists_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = store_config(&tmp);
        let store = SqliteVectorStore::open(&config, Similarity::Cosine).await.unwrap();
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();

        let bad: Vec<Vec<f32>> = embeddings.iter().map(|_| vec![1.0, 0.0, 0.0]).collect();
        let err = store.insert(&chunks, &bad).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));

        store.reload().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_invalid_first_batch_does_not_create_collection() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
            .await
            .unwrap();
        let (chunks, _) = sample();
        let err = store.insert(&chunks, &[vec![1.0, 0.0]]).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(store.state().await.unwrap(), StoreState::Absent);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_searches_during_inserts_see_whole_batches() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteVectorStore::open(&store_config(&tmp), Similarity::Cosine)
                .await
                .unwrap(),
        );
        let (chunks, embeddings) = sample();

        let writer = {
            let store = Arc::clone(&store);
            let chunks = chunks.clone();
            let embeddings = embeddings.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    store.insert(&chunks, &embeddings).await.unwrap();
                }
            })
        };
        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                for _ in 0..10 {
                    let n = store.search(&[1.0, 0.0], 100).await.unwrap().len();
                    assert_eq!(n % 4, 0, "observed a partial batch: {}", n);
                }
            }));
        }
        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_l2_similarity_ranking() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&store_config(&tmp), Similarity::L2)
            .await
            .unwrap();
        let (chunks, embeddings) = sample();
        store.insert(&chunks, &embeddings).await.unwrap();
        let results = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }
}
