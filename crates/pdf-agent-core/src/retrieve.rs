//! Query-time retrieval: embed the question, search the store, drop weak hits.
//!
//! The retriever operates entirely through the [`EmbeddingProvider`] and
//! [`VectorStore`] traits. Ordering and tie-breaks come unchanged from
//! [`VectorStore::search`]; the retriever only filters.

use std::sync::Arc;

use crate::embedding::{check_batch_shape, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::RetrievalResult;
use crate::store::VectorStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Maximum number of hits requested from the store.
    pub k: usize,
    /// Hits scoring strictly below this are discarded.
    pub min_relevance: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 3,
            min_relevance: 0.5,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    /// Retrieve with the configured `k` and `min_relevance`.
    pub async fn retrieve(&self, query_text: &str) -> Result<Vec<RetrievalResult>> {
        self.retrieve_with(query_text, self.params.k, self.params.min_relevance)
            .await
    }

    /// Retrieve the top `k` chunks scoring at least `min_relevance`.
    ///
    /// An empty vector means "no matching results" and is not an error.
    /// Embedding failures propagate as [`Error::Embedding`].
    pub async fn retrieve_with(
        &self,
        query_text: &str,
        k: usize,
        min_relevance: f32,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::Configuration("retrieval k must be > 0".into()));
        }

        let query_embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|e| Error::embedding(format!("{:#}", e)))?;
        check_batch_shape(1, std::slice::from_ref(&query_embedding))?;

        let hits = self.store.search(&query_embedding, k).await?;
        let found = hits.len();
        let results: Vec<RetrievalResult> = hits
            .into_iter()
            .filter(|r| r.score >= min_relevance)
            .collect();

        tracing::debug!(
            found,
            kept = results.len(),
            min_relevance,
            "retrieved candidates"
        );
        Ok(results)
    }
}
