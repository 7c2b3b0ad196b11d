mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memora::config::MemoraConfig;

#[derive(Parser)]
#[command(name = "memora", version, about = "Session-gated memo service")]
struct Cli {
    /// Config file (defaults to ~/.memora/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Show memo statistics for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Check database health
    Doctor,
    /// Export memos and tags as JSON to stdout
    Export {
        /// Only export this user's data
        #[arg(long)]
        user: Option<String>,
    },
    /// Import memos from an export file
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MemoraConfig::load_from(path)?,
        None => MemoraConfig::load()?,
    };

    // Log to stderr so `export` output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => memora::server::serve(config).await?,
        Command::Stats { user } => cli::stats::stats(&config, &user)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Export { user } => cli::export::export(&config, user.as_deref())?,
        Command::Import { file } => cli::import::import(&config, &file)?,
    }

    Ok(())
}
