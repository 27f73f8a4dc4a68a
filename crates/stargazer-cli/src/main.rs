use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use stargazer_cli::commands::{cache_key, mcp, search};
use stargazer_cli::{FilterArgs, GlobalOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find stargazing sites near roads under dark skies")]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a bounding box and print one page of sites.
    Search(search::SearchArgs),
    /// Print the cache key (resource_id) for a set of filters.
    CacheKey(FilterArgs),
    /// Serve the Model Context Protocol over stdin/stdout.
    Mcp {
        /// Log filter, e.g. "debug" (default: RUST_LOG or "info").
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Search(args) => {
            configure_tracing(None, "warn")?;
            search::run_search(&cli.global, args).await
        }
        Command::CacheKey(filters) => {
            configure_tracing(None, "warn")?;
            cache_key::run_cache_key(filters, cli.global.format)
        }
        Command::Mcp { log_level } => {
            configure_tracing(log_level.as_deref(), "info")?;
            mcp::run_mcp_server(&cli.global).await
        }
    }
}

/// Configure tracing to write only to stderr; stdout carries results or
/// protocol frames.
fn configure_tracing(log_level: Option<&str>, default_level: &str) -> Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    };

    let subscriber = fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    Ok(())
}
