//! # Memoria CLI
//!
//! The `memoria` binary drives the quiz pipeline: index construction,
//! inspection, debug retrieval, offline question generation, and the HTTP
//! quiz server.
//!
//! ## Usage
//!
//! ```bash
//! memoria --config ./config/memoria.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `memoria build` | Chunk and embed the archive, persisting the index cache |
//! | `memoria stats` | Show index and cache statistics |
//! | `memoria search "<query>"` | Semantic search over the indexed chunks |
//! | `memoria ask` | Generate one quiz question and print it as JSON |
//! | `memoria serve` | Start the quiz HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Build the index (no-op when a valid cache exists)
//! memoria build
//!
//! # Force a full rebuild after changing the corpus
//! memoria build --force
//!
//! # Debug retrieval with filters
//! memoria search "te amo" --since 2023-01-01 --sender "Ana"
//!
//! # Merge several seed phrases
//! memoria search "apodos cariñosos" "te extraño" --limit 5
//!
//! # Try question generation without a server
//! memoria ask --number 3
//! ```

mod ask_cmd;
mod build_cmd;
mod chunk;
mod config;
mod corpus;
mod embedding;
mod extract;
mod generate;
mod index;
mod llm;
mod models;
mod retrieve;
mod search;
mod server;
mod session;
mod stats;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Memoria — a retrieval-augmented quiz chatbot over a personal message
/// archive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/memoria.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "memoria",
    about = "Memoria — a retrieval-augmented quiz chatbot over a personal message archive",
    version,
    long_about = "Memoria ingests a chat export, chunks and embeds it into a cached vector \
    index, and serves a quiz whose questions an LLM generates from the retrieved history. \
    Passing the quiz unlocks a location reveal."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/memoria.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the embedding index from the message archive.
    ///
    /// Loads every matching export file, chunks the messages, embeds each
    /// chunk with the configured provider, and persists the chunk metadata
    /// and raw vectors to the cache directory. When a valid cache already
    /// exists this is a fast no-op unless `--force` is given.
    Build {
        /// Ignore any existing cache and rebuild from scratch.
        #[arg(long)]
        force: bool,
    },

    /// Show index and cache statistics.
    Stats,

    /// Semantic search over the indexed chunks.
    ///
    /// One query searches directly (date and sender filters apply);
    /// several queries are merged with per-chunk deduplication.
    Search {
        /// One or more query phrases.
        #[arg(num_args = 1..)]
        queries: Vec<String>,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only chunks overlapping dates on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only chunks overlapping dates on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Only chunks containing a message from this sender.
        #[arg(long)]
        sender: Option<String>,
    },

    /// Generate one quiz question and print it as JSON.
    ///
    /// Runs the full retrieval + extraction + LLM pipeline for the given
    /// question number, outside the server.
    Ask {
        /// 1-based question number (selects the topic seed).
        #[arg(long, default_value_t = 1)]
        number: u32,
    },

    /// Start the quiz HTTP server.
    ///
    /// Builds (or cache-loads) the index first, then binds the address
    /// configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { force } => {
            build_cmd::run_build(&cfg, force).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Search {
            queries,
            limit,
            since,
            until,
            sender,
        } => {
            search::run_search(&cfg, &queries, limit, since, until, sender).await?;
        }
        Commands::Ask { number } => {
            ask_cmd::run_ask(&cfg, number).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
