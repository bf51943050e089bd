//! Engram CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `record`   — Store a message
//! - `search`   — Semantic search over stored history
//! - `context`  — Build and print the adaptive context index
//! - `show`     — Print an entity with its chunks
//! - `tools`    — List the retrieval tool surface
//! - `maintain` — Run one background maintenance pass
//! - `stats`    — Show store statistics

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "engram",
    about = "Engram — graph-backed conversation memory with an adaptive context index",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.engram/config.toml
    Init,

    /// Store a message in the history graph
    Record {
        /// The message content
        message: String,

        /// Sender role: user, assistant, or system
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Optional parent message id (reply chain)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Search stored history by meaning
    Search {
        /// The search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Build and print the adaptive context index for a query
    Context {
        /// The query to anchor the index on
        query: String,
    },

    /// Print one entity, including its chunk set when chunked
    Show {
        /// The entity id
        id: String,
    },

    /// List the retrieval tools exposed to the LLM runtime
    Tools,

    /// Run one maintenance pass (topic building, orphan cleanup)
    Maintain,

    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Record {
            message,
            role,
            parent,
        } => commands::record::run(&message, &role, parent).await?,
        Commands::Search { query, limit } => commands::search::run(&query, limit).await?,
        Commands::Context { query } => commands::context::run(&query).await?,
        Commands::Show { id } => commands::show::run(&id).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Maintain => commands::maintain::run().await?,
        Commands::Stats => commands::stats::run().await?,
    }

    Ok(())
}
