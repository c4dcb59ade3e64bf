//! Implementations of the `pdfa` subcommands.
//!
//! Results go to stdout; logs go to stderr through `tracing`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use pdf_agent_core::store::VectorStore;

use crate::config::Config;
use crate::ingest::IngestSource;
use crate::pipeline::Pipeline;
use crate::sqlite_store::SqliteVectorStore;
use crate::worker::{Job, WorkerPool};

pub async fn run_ingest(
    config: &Config,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    clear: bool,
    dry_run: bool,
) -> Result<()> {
    let source = IngestSource::from_paths(file, dir)?;
    let pipeline = Pipeline::from_config(config).await?;

    let report = if dry_run {
        pipeline.ingestor().dry_run(&source).await?
    } else {
        pipeline.ingestor().ingest(&source, clear).await?
    };
    println!("{}", report);
    Ok(())
}

pub async fn run_query(config: &Config, text: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    let outcome = pipeline.engine().answer(text).await?;
    let rendered = outcome.render();
    if rendered.ends_with('\n') {
        print!("{}", rendered);
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&config.store, config.retrieval.similarity).await?;
    store.clear().await?;
    println!("Cleared collection '{}'", config.store.collection);
    Ok(())
}

pub async fn run_status(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&config.store, config.retrieval.similarity).await?;
    let state = store.state().await?;

    println!("collection: {}", config.store.collection);
    println!("path: {}", store.path().display());
    println!("state: {}", state);
    println!("records: {}", state.record_count());
    println!("embedding: {}", config.embedding.provider);
    println!("generation: {}", config.generation.provider);

    store.close().await;
    Ok(())
}

/// One line of `pdfa shell` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Ingest { path: PathBuf, clear: bool },
    Query(String),
    Quit,
    Empty,
}

pub fn parse_shell_line(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    if line == ":quit" || line == ":q" {
        return ShellCommand::Quit;
    }
    for (prefix, clear) in [(":ingest! ", true), (":ingest ", false)] {
        if let Some(path) = line.strip_prefix(prefix) {
            return ShellCommand::Ingest {
                path: PathBuf::from(path.trim()),
                clear,
            };
        }
    }
    ShellCommand::Query(line.to_string())
}

/// Read commands from stdin and run them on the worker pool. Results are
/// printed as each job completes; EOF waits for outstanding jobs.
pub async fn run_shell(config: &Config) -> Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config).await?);
    let pool = WorkerPool::start(pipeline, config.workers.count);

    eprintln!("pdfa shell: `:ingest <path>`, `:ingest! <path>` (clear first), `:quit`; anything else is a question");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let job = match parse_shell_line(&line) {
            ShellCommand::Empty => continue,
            ShellCommand::Quit => break,
            ShellCommand::Ingest { path, clear } => Job::Ingest {
                source: IngestSource::from_path(path),
                clear,
            },
            ShellCommand::Query(text) => Job::Query { text },
        };
        pool.submit_with(job, |message| {
            if message.ends_with('\n') {
                print!("{}", message);
            } else {
                println!("{}", message);
            }
        })
        .await?;
    }

    pool.shutdown().await;
    Ok(())
}
