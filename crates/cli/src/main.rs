//! Colloquy CLI. The main entry point.
//!
//! Commands:
//! - `chat`    Interactive chat or single-message mode
//! - `models`  Show which endpoints and models the service offers
//! - `rerank`  Order documents by relevance to a query
//! - `config`  Show the effective configuration or write a starter file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "colloquy",
    about = "Colloquy: a resilient chat client for the Cohere API",
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
    /// Chat with the model
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// System preamble for the conversation
        #[arg(long)]
        preamble: Option<String>,

        /// Character budget for each reply (0 = unbounded)
        #[arg(long)]
        max_chars: Option<usize>,

        /// Word budget for each reply (0 = unbounded)
        #[arg(long)]
        max_words: Option<usize>,

        /// Chat model to request
        #[arg(long)]
        model: Option<String>,
    },

    /// Show the resolved endpoint and model capabilities
    Models,

    /// Rank documents by relevance to a query
    Rerank {
        /// The query to rank against
        #[arg(short, long)]
        query: String,

        /// Keep only the N most relevant documents
        #[arg(long)]
        top_n: Option<usize>,

        /// Rerank model to request
        #[arg(long)]
        model: Option<String>,

        /// Documents to rank
        #[arg(required = true)]
        documents: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write a starter config file instead
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            preamble,
            max_chars,
            max_words,
            model,
        } => {
            let options = commands::chat::ChatArgs {
                message,
                preamble,
                max_chars,
                max_words,
                model,
            };
            commands::chat::run(options).await?
        }
        Commands::Models => commands::models::run().await?,
        Commands::Rerank {
            query,
            top_n,
            model,
            documents,
        } => commands::rerank::run(&query, &documents, top_n, model.as_deref()).await?,
        Commands::Config { init } => {
            if init {
                commands::config_cmd::init()?
            } else {
                commands::config_cmd::show()?
            }
        }
    }

    Ok(())
}
