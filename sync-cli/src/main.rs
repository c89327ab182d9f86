//! # sync-cli
//!
//! CLI tool for exercising subsync.
//!
//! ## Commands
//!
//! - `search`: Type search terms into a disposable query slot
//! - `status`: Follow the aggregated sync status
//! - `probe`: Run one reachability check
//!
//! ## Example
//!
//! ```bash
//! # Simulate typing "a", "al", "ali" into a user search box
//! subsync search a al ali
//!
//! # Same search with the network down
//! subsync search --offline ali
//!
//! # Watch the sync status for 5 seconds
//! subsync --config subsync.toml status --duration-secs 5
//!
//! # Check reachability of a host
//! subsync probe --address example.com:443
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use subsync_client::Config;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{probe, search, status};

/// CLI tool for exercising subsync.
#[derive(Parser, Debug)]
#[command(name = "subsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue one disposable query per search term, as if typed
    Search {
        /// Search terms, in typing order
        #[arg(required = true)]
        terms: Vec<String>,

        /// Simulate an unreachable network
        #[arg(long)]
        offline: bool,

        /// Simulated server latency before a subscription completes
        #[arg(long, default_value = "100")]
        latency_ms: u64,

        /// Pause between terms
        #[arg(long, default_value = "20")]
        typing_ms: u64,
    },

    /// Follow the sync status of a simulated session
    Status {
        /// How long to watch
        #[arg(long, default_value = "5")]
        duration_secs: u64,

        /// Print each snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one reachability check
    Probe {
        /// Address to probe (defaults to the configured probe address)
        #[arg(long)]
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Search {
            terms,
            offline,
            latency_ms,
            typing_ms,
        } => {
            let options = search::Options {
                offline,
                latency: std::time::Duration::from_millis(latency_ms),
                typing: std::time::Duration::from_millis(typing_ms),
            };
            search::run(&config, &terms, options).await?;
        }
        Commands::Status {
            duration_secs,
            json,
        } => {
            status::run(
                &config,
                std::time::Duration::from_secs(duration_secs),
                json,
            )
            .await?;
        }
        Commands::Probe { address } => {
            probe::run(&config, address.as_deref()).await?;
        }
    }

    Ok(())
}
