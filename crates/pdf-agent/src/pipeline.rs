//! Wiring of config, store, providers and the two pipelines.

use std::sync::Arc;

use anyhow::Result;

use pdf_agent_core::embedding::EmbeddingProvider;
use pdf_agent_core::generation::GenerationProvider;
use pdf_agent_core::retrieve::Retriever;
use pdf_agent_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::extract::{DocumentLoader, FileLoader};
use crate::generation::create_generator;
use crate::ingest::{IngestSource, Ingestor};
use crate::query::QueryEngine;
use crate::sqlite_store::SqliteVectorStore;

/// One collection with its ingestion and query paths. The store is the
/// only state shared between them.
pub struct Pipeline {
    store: Arc<dyn VectorStore>,
    ingestor: Ingestor,
    engine: QueryEngine,
}

impl Pipeline {
    /// Assemble a pipeline from already constructed parts.
    pub fn new(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<Self> {
        let ingestor = Ingestor::new(
            loader,
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.chunking.params()?,
            config.ingest.clone(),
        );
        let engine = QueryEngine::new(
            Retriever::new(embedder, Arc::clone(&store), config.retrieval.params()),
            generator,
            config.prompt.template()?,
        );
        Ok(Self {
            store,
            ingestor,
            engine,
        })
    }

    /// Open the SQLite collection and the configured providers.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteVectorStore::open(&config.store, config.retrieval.similarity).await?;
        tracing::debug!(path = %store.path().display(), "opened store");
        Self::new(
            config,
            Arc::new(store),
            create_provider(&config.embedding)?,
            create_generator(&config.generation)?,
            Arc::new(FileLoader),
        )
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// Ingestion entry point: status line on success, `Error: ...` otherwise.
    pub async fn ingest_message(&self, source: &IngestSource, clear: bool) -> String {
        match self.ingestor.ingest(source, clear).await {
            Ok(report) => report.to_string(),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Query entry point; see [`QueryEngine::respond`].
    pub async fn query_message(&self, question: &str) -> String {
        self.engine.respond(question).await
    }
}
