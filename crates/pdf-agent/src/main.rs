//! # PDF Agent CLI (`pdfa`)
//!
//! ## Usage
//!
//! ```bash
//! pdfa --config ./config/pdfa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfa ingest --file <path>` | Ingest one document |
//! | `pdfa ingest --dir <path>` | Ingest every matching document in a directory |
//! | `pdfa query "<text>"` | Answer a question from the collection |
//! | `pdfa clear` | Delete the collection |
//! | `pdfa status` | Show the collection state and record count |
//! | `pdfa shell` | Interactive session with background jobs |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdf_agent::commands;
use pdf_agent::config;

/// PDF Agent CLI: ask questions about your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "pdfa",
    about = "PDF Agent: ingest documents into a local vector store and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfa.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into the collection.
    ///
    /// Exactly one of `--file` or `--dir` is required. Directory ingestion
    /// skips documents that cannot be read and lists them afterwards.
    Ingest {
        /// A single document (.pdf, .md, .txt).
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// A directory to scan with the configured include/exclude globs.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Replace the whole collection instead of appending.
        #[arg(long)]
        clear: bool,

        /// Extract and chunk only; report counts without embedding or storing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question using the most relevant stored chunks.
    Query {
        /// The question.
        text: String,
    },

    /// Delete the collection and all its records.
    Clear,

    /// Show the collection state (absent, empty, populated) and record count.
    Status,

    /// Interactive session.
    ///
    /// Each line is a question, `:ingest <path>` or `:ingest! <path>`
    /// (clear first). Jobs run in the background and print when done.
    Shell,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pdfa=debug,pdf_agent=debug,pdf_agent_core=debug"
    } else {
        "pdfa=info,pdf_agent=info,pdf_agent_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            file,
            dir,
            clear,
            dry_run,
        } => {
            commands::run_ingest(&cfg, file, dir, clear, dry_run).await?;
        }
        Commands::Query { text } => {
            commands::run_query(&cfg, &text).await?;
        }
        Commands::Clear => {
            commands::run_clear(&cfg).await?;
        }
        Commands::Status => {
            commands::run_status(&cfg).await?;
        }
        Commands::Shell => {
            commands::run_shell(&cfg).await?;
        }
    }

    Ok(())
}
