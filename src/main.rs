//! solacquire - SUNAT SOL session-token acquisition service.
//!
//! Retrieves short-lived bearer tokens from the SUNAT portal by replaying
//! the SOL login in a real browser, behind an asynchronous ticket API.

mod browser;
mod cli;
mod config;
mod models;
mod queue;
mod resolver;
mod server;
mod store;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "solacquire=info"
    } else {
        "solacquire=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
