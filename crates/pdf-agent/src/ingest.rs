//! Ingestion pipeline orchestration.
//!
//! Coordinates the ingest flow: source scan → extraction → chunking →
//! embedding → storage. Ordering guarantees:
//!
//! - All chunk texts are embedded before the store is touched, so a failed
//!   embedding leaves the collection exactly as it was, even with `clear`.
//! - With `clear`, the batch goes through a single `replace` call once
//!   embedding succeeded, so a concurrent ingest can never slip its records
//!   in between the clear and the insert. Without it, one `insert` call.
//! - In a directory, a document that fails extraction is skipped and listed
//!   in the report; the rest are still ingested. A single-file ingest whose
//!   extraction fails is an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdf_agent_core::chunk::{chunk_document, ChunkParams};
use pdf_agent_core::embedding::{embed_checked, EmbeddingProvider};
use pdf_agent_core::models::Chunk;
use pdf_agent_core::store::VectorStore;
use pdf_agent_core::{Error, Result};

use crate::config::IngestConfig;
use crate::connector_fs::scan_directory;
use crate::extract::{load_document, DocumentLoader};

/// What to ingest: exactly one file or one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    File(PathBuf),
    Directory(PathBuf),
}

impl IngestSource {
    /// Build a source from mutually exclusive `--file` / `--dir` inputs.
    pub fn from_paths(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<Self> {
        match (file, dir) {
            (Some(file), None) => Ok(IngestSource::File(file)),
            (None, Some(dir)) => Ok(IngestSource::Directory(dir)),
            (None, None) => Err(Error::Configuration(
                "either a file or a directory must be given".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "give either a file or a directory, not both".to_string(),
            )),
        }
    }

    /// Classify a single path by what is on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            IngestSource::Directory(path)
        } else {
            IngestSource::File(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            IngestSource::File(p) | IngestSource::Directory(p) => p,
        }
    }
}

impl fmt::Display for IngestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub source_id: String,
    pub reason: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub documents: usize,
    pub chunks: usize,
    pub inserted: usize,
    pub skipped: Vec<SkippedDocument>,
    pub cleared: bool,
    pub dry_run: bool,
}

impl IngestReport {
    /// `Processed N chunks from <source>`
    pub fn status_line(&self) -> String {
        format!("Processed {} chunks from {}", self.chunks, self.source)
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_line())?;
        if self.dry_run {
            write!(f, "\n  dry run: {} documents, nothing stored", self.documents)?;
        }
        for skipped in &self.skipped {
            write!(f, "\n  skipped {}: {}", skipped.source_id, skipped.reason)?;
        }
        Ok(())
    }
}

/// Chunks extracted from a source, before embedding.
struct Plan {
    documents: usize,
    chunks: Vec<Chunk>,
    skipped: Vec<SkippedDocument>,
}

pub struct Ingestor {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    params: ChunkParams,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        params: ChunkParams,
        config: IngestConfig,
    ) -> Self {
        Self {
            loader,
            embedder,
            store,
            params,
            config,
        }
    }

    /// Ingest `source`, optionally replacing the whole collection.
    pub async fn ingest(&self, source: &IngestSource, clear: bool) -> Result<IngestReport> {
        let plan = self.plan(source).await?;

        let texts: Vec<String> = plan.chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_checked(self.embedder.as_ref(), &texts).await?;
        tracing::debug!(vectors = embeddings.len(), model = self.embedder.model_name(), "embedded chunks");

        let inserted = if clear {
            self.store.replace(&plan.chunks, &embeddings).await?
        } else {
            self.store.insert(&plan.chunks, &embeddings).await?
        };
        tracing::info!(inserted, source = %source, "saved chunks");

        Ok(IngestReport {
            source: source.to_string(),
            documents: plan.documents,
            chunks: plan.chunks.len(),
            inserted,
            skipped: plan.skipped,
            cleared: clear,
            dry_run: false,
        })
    }

    /// Extract and chunk `source` without embedding or storing anything.
    pub async fn dry_run(&self, source: &IngestSource) -> Result<IngestReport> {
        let plan = self.plan(source).await?;
        Ok(IngestReport {
            source: source.to_string(),
            documents: plan.documents,
            chunks: plan.chunks.len(),
            inserted: 0,
            skipped: plan.skipped,
            cleared: false,
            dry_run: true,
        })
    }

    async fn plan(&self, source: &IngestSource) -> Result<Plan> {
        let loader = Arc::clone(&self.loader);
        let params = self.params;
        let config = self.config.clone();
        let owned = source.clone();

        // Extraction is blocking file I/O plus PDF parsing
        let plan = tokio::task::spawn_blocking(move || build_plan(loader.as_ref(), &owned, params, &config))
            .await
            .map_err(|e| Error::SourceRead {
                source_id: source.to_string(),
                message: format!("extraction task failed: {}", e),
            })??;

        tracing::info!(
            documents = plan.documents,
            chunks = plan.chunks.len(),
            skipped = plan.skipped.len(),
            "split documents into chunks"
        );
        Ok(plan)
    }
}

fn build_plan(
    loader: &dyn DocumentLoader,
    source: &IngestSource,
    params: ChunkParams,
    config: &IngestConfig,
) -> Result<Plan> {
    match source {
        IngestSource::File(path) => {
            let source_id = path.to_string_lossy().to_string();
            let doc = load_document(loader, path, &source_id)?;
            Ok(Plan {
                documents: 1,
                chunks: chunk_document(&doc, &params),
                skipped: Vec::new(),
            })
        }
        IngestSource::Directory(dir) => {
            let files = scan_directory(dir, config).map_err(|e| Error::SourceRead {
                source_id: dir.to_string_lossy().to_string(),
                message: format!("{:#}", e),
            })?;

            let mut plan = Plan {
                documents: 0,
                chunks: Vec::new(),
                skipped: Vec::new(),
            };
            for file in files {
                match load_document(loader, &file.path, &file.source_id) {
                    Ok(doc) => {
                        let chunks = chunk_document(&doc, &params);
                        tracing::debug!(source_id = %file.source_id, chunks = chunks.len(), "chunked document");
                        plan.documents += 1;
                        plan.chunks.extend(chunks);
                    }
                    Err(e) => {
                        tracing::warn!(source_id = %file.source_id, error = %e, "skipping document");
                        plan.skipped.push(SkippedDocument {
                            source_id: file.source_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Ok(plan)
        }
    }
}
