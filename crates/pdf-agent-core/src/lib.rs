//! # PDF Agent Core
//!
//! Runtime-free logic for PDF Agent: data models, the overlapping-window
//! chunker, the vector store abstraction with exact similarity search, the
//! retriever and the prompt assembler.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. Embedding
//! and generation models are consumed through the [`embedding::EmbeddingProvider`]
//! and [`generation::GenerationProvider`] traits; persistence backends
//! implement [`store::VectorStore`].
//!
//! ```text
//! ingest:  Document ─▶ chunk ─▶ EmbeddingProvider ─▶ VectorStore::insert
//! query:   question ─▶ Retriever (embed + search + filter) ─▶ assemble ─▶ GenerationProvider
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
