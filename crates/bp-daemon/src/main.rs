//! # bp-daemon
//!
//! Trigger runner for bucketpush.
//!
//! - `bp-daemon handle --config pipeline.toml --event event.json` processes
//!   one storage notification (or `-` for stdin) and exits non-zero if any
//!   publish failed. This is the entry point for event-driven invocation.
//! - `bp-daemon watch --config pipeline.toml` watches the local bucket
//!   directory and publishes whenever the configured object changes.
//!
//! Logs go to stderr; `handle` writes one JSON result line per event to
//! stdout.

mod handle;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bp_publish::{Pipeline, PipelineConfig};

/// Publish storage objects into git repositories.
#[derive(Parser)]
#[command(name = "bp-daemon", version, about)]
struct Cli {
    /// Pipeline configuration file.
    #[arg(long, global = true, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one trigger document and exit.
    Handle {
        /// Trigger JSON file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Watch the local bucket directory and publish on change.
    Watch {
        /// Quiet period after the last change before publishing.
        #[arg(long, default_value_t = 500)]
        settle_ms: u64,
        /// Publish once at startup if the object already exists.
        #[arg(long)]
        publish_on_start: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!(
        bucket = %config.source.bucket,
        key = %config.source.key,
        repo = %config.target.repo,
        branch = %config.target.branch,
        "pipeline configured"
    );

    match cli.command {
        Commands::Handle { event } => {
            let pipeline = Pipeline::from_config(&config);
            handle::execute(pipeline, &event).await
        }
        Commands::Watch {
            settle_ms,
            publish_on_start,
        } => {
            let pipeline = Arc::new(Pipeline::from_config(&config));
            let bucket_dir = config.source.root.join(&config.source.bucket);
            watch::execute(
                pipeline,
                bucket_dir,
                watch::WatchOptions {
                    settle: Duration::from_millis(settle_ms),
                    publish_on_start,
                },
            )
            .await
        }
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("bp_publish=info".parse()?)
        .add_directive("bp_daemon=info".parse()?);

    // Logs go to stderr so they don't interfere with results on stdout.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
