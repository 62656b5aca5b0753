//! # CI Search CLI (`ci-search`)
//!
//! ## Usage
//!
//! ```bash
//! ci-search --config ./config/ci-search.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ci-search serve` | Start the web UI on `[server].bind` |
//! | `ci-search search <PATTERN>...` | Run one search and print the HTML fragment |
//! | `ci-search stats` | Print the size of the index |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `ci_search=info,tower_http=info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ci_search::{config, search, server, stats};

/// Search CI job artifacts with regular expressions.
#[derive(Parser)]
#[command(
    name = "ci-search",
    about = "Regex search over CI job artifacts with live-streamed HTML results",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ci-search.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the search page, streaming
    /// results as they are found.
    Serve,

    /// Run a single search and write the rendered HTML to stdout.
    Search {
        /// One or more regular expressions.
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Artifact type: `junit`, `build-log` or `all`.
        #[arg(long = "type")]
        search_type: Option<String>,

        /// Only search jobs whose path matches this regular expression.
        #[arg(long)]
        name: Option<String>,

        /// Oldest result to include, e.g. `24h` or `90m`.
        #[arg(long)]
        max_age: Option<String>,

        /// Context lines around each hit; `-1` prints the summary table.
        #[arg(long, allow_hyphen_values = true)]
        context: Option<i32>,
    },

    /// Show the size of the index.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ci_search=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            patterns,
            search_type,
            name,
            max_age,
            context,
        } => {
            let args = search::SearchArgs {
                patterns,
                search_type,
                name,
                max_age,
                context,
            };
            search::run_search(&cfg, &args).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}
