//! # PDF Agent
//!
//! **Local question answering over your own PDFs and notes.**
//!
//! PDF Agent ingests documents, splits them into overlapping chunks, embeds
//! each chunk, stores the vectors in a SQLite collection and answers
//! questions by retrieving the most relevant chunks as grounding context
//! for a generation model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ FileLoader  │──▶│  Ingestor     │──▶│  SQLite    │
//! │ PDF/MD/TXT  │   │ Chunk+Embed  │   │ collection │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                   ┌──────────────┐         │
//!      question ───▶│ QueryEngine   │◀────────┘
//!                   │ retrieve+gen │
//!                   └──────────────┘
//! ```
//!
//! Both paths can run at once on a [`worker::WorkerPool`]; the store is the
//! only shared state.
//!
//! ## Quick Start
//!
//! ```bash
//! pdfa ingest --dir ./papers --clear
//! pdfa query "What does the paper conclude?"
//! pdfa status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`extract`] | `DocumentLoader` trait and the PDF/text `FileLoader` |
//! | [`connector_fs`] | Directory walk with include/exclude globs |
//! | [`ingest`] | Ingestion pipeline: scan → extract → chunk → embed → store |
//! | [`query`] | Retrieval + prompt assembly + generation |
//! | [`embedding`] | Ollama, OpenAI and local embedding providers |
//! | [`generation`] | Ollama and OpenAI generation providers |
//! | [`http`] | Shared retry/backoff for provider HTTP calls |
//! | [`sqlite_store`] | Persistent `VectorStore` backed by SQLite |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Collection schema (idempotent) |
//! | [`pipeline`] | Wiring of store, providers and pipelines |
//! | [`worker`] | Background job queue |
//! | [`commands`] | `pdfa` subcommand implementations |

pub mod commands;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod pipeline;
pub mod query;
pub mod sqlite_store;
pub mod worker;

pub use pdf_agent_core::store;
pub use pdf_agent_core::{Error, Result};
