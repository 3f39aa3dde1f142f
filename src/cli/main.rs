//! Operator CLI for the SR retrieval engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sr_retrieval::{
    config::Config,
    engine::{PassthroughAnalyzer, RetrievalEngine},
    feedback::create_feedback_store,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sr-retrieval-cli", version, about = "Operate the SR historical retrieval index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from historical corpus files
    Rebuild {
        /// JSON files holding arrays of ticket rows
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Rank historical tickets by similarity to a query
    Search {
        /// Query text
        query: String,

        /// Number of matches to return
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Run a learning merge now
    Merge,

    /// Show index and staging status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sr_retrieval=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        Config::default()
    });

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating data directory {:?}", config.storage.data_dir))?;

    let feedback_store =
        create_feedback_store(&config.storage).context("opening feedback store")?;
    let engine = Arc::new(
        RetrievalEngine::new(&config, feedback_store, Arc::new(PassthroughAnalyzer))
            .context("initializing retrieval engine")?,
    );

    match cli.command {
        Commands::Rebuild { sources } => {
            let report = engine
                .rebuild_from_sources(&sources)
                .await
                .context("rebuilding index")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Search { query, top_k } => {
            let results = engine.semantic_search(&query, top_k);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Merge => {
            let report = engine.merge().await.context("running merge")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let status = engine.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
