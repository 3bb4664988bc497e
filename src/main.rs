//! # Session Recall CLI (`recall`)
//!
//! Indexes assistant session logs into a local vector index and serves
//! semantic search over them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and schema |
//! | `recall ingest` | Index session logs not indexed yet |
//! | `recall search "<query>"` | Search indexed conversations |
//! | `recall stats` | Show index size per project |
//! | `recall serve stdio` | MCP server over stdin/stdout |
//! | `recall serve http` | JSON tool server on `[server].bind` |
//!
//! ## Examples
//!
//! ```bash
//! recall ingest --config ./config/recall.toml
//! recall search "how did we fix the parser crash" --limit 3
//! recall serve stdio
//! ```
//!
//! Logs go to stderr; set `RECALL_LOG` (or `RUST_LOG`) to adjust, e.g.
//! `RECALL_LOG=debug`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use session_recall::config;
use session_recall::ingest;
use session_recall::mcp;
use session_recall::migrate;
use session_recall::progress::ProgressMode;
use session_recall::search;
use session_recall::server;
use session_recall::stats;

#[derive(Parser)]
#[command(
    name = "recall",
    about = "Session Recall: semantic memory over past assistant sessions",
    version
)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at info level (overridden by RECALL_LOG / RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index session logs that have not been indexed yet.
    Ingest {
        /// Count pending sessions and chunks without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Emit progress as JSON lines on stderr.
        #[arg(long)]
        json_progress: bool,

        /// Disable progress output.
        #[arg(long, conflicts_with = "json_progress")]
        no_progress: bool,
    },

    /// Search indexed conversations by meaning.
    Search {
        query: String,

        /// Maximum number of results (clamped to the configured maximum).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show index statistics.
    Stats,

    /// Serve the memory tools.
    Serve {
        #[arg(value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    /// MCP over stdin/stdout.
    Stdio,
    /// JSON HTTP API.
    Http,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("RECALL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    // stdout belongs to command output and the stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest {
            dry_run,
            json_progress,
            no_progress,
        } => {
            let mode = if no_progress {
                ProgressMode::Off
            } else if json_progress {
                ProgressMode::Json
            } else {
                ProgressMode::default_for_tty()
            };
            ingest::run_ingest(&cfg, dry_run, mode).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve { transport } => match transport {
            Transport::Stdio => mcp::run_stdio(&cfg).await?,
            Transport::Http => server::run_server(&cfg).await?,
        },
    }

    Ok(())
}
