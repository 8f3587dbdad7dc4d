//! # Shiori CLI
//!
//! The `shiori` binary is the interface to the reading companion. It
//! provides commands for index initialization, volume ingestion, status
//! reporting, and the interactive chat session.
//!
//! ## Usage
//!
//! ```bash
//! shiori --config ./shiori.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shiori init` | Create the SQLite chunk index |
//! | `shiori ingest [PATH]` | Ingest the library directory or a single file, then exit |
//! | `shiori reingest` | Clear the registry and re-embed every volume |
//! | `shiori status` | Print registry entry count and indexed chunk count |
//! | `shiori chat` | Start the interactive session |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the index
//! shiori init --config ./shiori.toml
//!
//! # Embed every volume in the library directory
//! shiori ingest
//!
//! # Embed one new volume
//! shiori ingest ./volumes/vol7.pdf
//!
//! # Ingest anything new, then chat
//! shiori chat --ingest
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use shiori::config;
use shiori::db;
use shiori::embedding::OllamaEmbedder;
use shiori::ingest;
use shiori::llm::OllamaChat;
use shiori::migrate;
use shiori::repl;
use shiori::store::SqliteStore;

/// Shiori — a retrieval-augmented reading companion for personal
/// light-novel libraries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/shiori.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "shiori",
    about = "Shiori — a retrieval-augmented reading companion for personal light-novel libraries",
    version,
    long_about = "Shiori chunks and embeds light-novel volumes (PDF / plain text) into a \
    persistent SQLite vector index and answers questions grounded in retrieved passages, \
    via a simple RAG prompt or a bounded tool-calling agent loop over an Ollama backend."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./shiori.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the chunk index schema.
    ///
    /// Creates the SQLite database file and the chunk table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest volumes, then exit.
    ///
    /// Without a path, ingests every supported file in the configured
    /// library directory in sorted order; with a path, ingests that file
    /// only. Already-embedded volumes are skipped unless `--force` is set.
    Ingest {
        /// A specific file to ingest instead of the whole library.
        path: Option<PathBuf>,

        /// Re-embed even if the registry already records the volume.
        #[arg(long)]
        force: bool,
    },

    /// Clear the registry and re-embed every volume in the library.
    ///
    /// The index itself is kept; stable chunk ids make the re-embed an
    /// in-place overwrite.
    Reingest,

    /// Print registry entry count and indexed chunk count.
    Status,

    /// Start the interactive chat session.
    Chat {
        /// Ingest the library directory before starting the session.
        #[arg(long)]
        ingest: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Ingest { path, force } => {
            migrate::run_migrations(&cfg).await?;
            let store = SqliteStore::new(db::connect(&cfg).await?);
            let embedder = OllamaEmbedder::new(&cfg.ollama)?;

            match path {
                Some(file) => {
                    let outcome = ingest::ingest_file(&cfg, &store, &embedder, &file, force).await;
                    println!(
                        "{}: {:?} ({} chunks, {} pages)",
                        outcome.filename, outcome.status, outcome.chunks, outcome.pages
                    );
                    if let Some(detail) = outcome.detail {
                        println!("  {}", detail);
                    }
                }
                None => {
                    let outcomes = ingest::ingest_directory(
                        &cfg,
                        &store,
                        &embedder,
                        &cfg.library.docs_dir,
                        force,
                    )
                    .await?;
                    println!("\nTotal: {} files processed", outcomes.len());
                }
            }
        }
        Commands::Reingest => {
            migrate::run_migrations(&cfg).await?;
            let store = SqliteStore::new(db::connect(&cfg).await?);
            let embedder = OllamaEmbedder::new(&cfg.ollama)?;

            println!("Clearing registry and re-ingesting all files...");
            let outcomes =
                ingest::clear_and_reingest(&cfg, &store, &embedder, &cfg.library.docs_dir).await?;
            println!("\nProcessed {} files", outcomes.len());
        }
        Commands::Status => {
            migrate::run_migrations(&cfg).await?;
            let store = SqliteStore::new(db::connect(&cfg).await?);
            ingest::print_status(&cfg, &store).await?;
        }
        Commands::Chat { ingest: ingest_first } => {
            migrate::run_migrations(&cfg).await?;
            let store = Arc::new(SqliteStore::new(db::connect(&cfg).await?));
            let embedder = Arc::new(OllamaEmbedder::new(&cfg.ollama)?);
            let model = Arc::new(OllamaChat::new(&cfg.ollama)?);

            if ingest_first {
                ingest::ingest_directory(
                    &cfg,
                    store.as_ref(),
                    embedder.as_ref(),
                    &cfg.library.docs_dir,
                    false,
                )
                .await?;
            }

            repl::run(&cfg, store, embedder, model).await?;
        }
    }

    Ok(())
}
