//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sol")]
#[command(about = "SUNAT SOL session-token acquisition service")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ticket API and scraping workers
    Serve {
        /// Port to listen on (overrides SOLACQUIRE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Number of concurrent scrape workers (overrides SOLACQUIRE_MAX_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Resolve tokens once and report per-target success (token values are
    /// never printed)
    Resolve {
        /// 11-digit RUC
        #[arg(long)]
        ruc: String,
        /// SOL username
        #[arg(long)]
        username: String,
        /// SOL key
        #[arg(long)]
        key: String,
        /// Targets to resolve (default: all)
        #[arg(short, long)]
        targets: Vec<String>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, workers } => commands::serve(port, workers).await,
        Commands::Resolve {
            ruc,
            username,
            key,
            targets,
        } => commands::resolve(ruc, username, key, targets).await,
    }
}
