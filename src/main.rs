//! Command-line interface for warehouse-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # One incremental pass over every mapping
//! warehouse-sync --config config.yaml run-once
//!
//! # Daily runs at the configured cron time
//! WAREHOUSE_SYNC_CONFIG=/etc/etl/config.yaml warehouse-sync schedule
//!
//! # Reload all of 2020 for one mapping
//! warehouse-sync backfill --mapping orders --start 2020-01-01 --end 2020-12-31
//! ```
//!
//! The process exits with status 1 if the config is invalid, a connection
//! cannot be set up, or any mapping failed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sync_engine::any_failed;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warehouse_sync::{run_scheduled, App, Config, CronSchedule};

#[derive(Parser)]
#[command(name = "warehouse-sync")]
#[command(about = "Incremental MySQL to BigQuery table sync")]
#[command(long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(
        long,
        global = true,
        default_value = "config.yaml",
        env = "WAREHOUSE_SYNC_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every mapping once and exit
    RunOnce,

    /// Sync every mapping on a daily cron schedule until interrupted
    Schedule {
        /// Overrides `schedule.cron` from the config file
        #[arg(long)]
        cron: Option<String>,
    },

    /// Reload a range of one mapping without moving its watermark
    Backfill {
        /// Mapping name
        #[arg(long)]
        mapping: String,

        /// Inclusive start: a timestamp, a date or an integer
        #[arg(long)]
        start: String,

        /// Inclusive end; a date covers the whole day. Defaults to now
        #[arg(long)]
        end: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run().await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Cancel `shutdown` on the first Ctrl-C.
fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling");
            shutdown.cancel();
        }
    });
}

/// Returns whether every mapping succeeded.
async fn run() -> anyhow::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    let shutdown = CancellationToken::new();

    match cli.command {
        Commands::RunOnce => {
            let app = App::connect(config).await?;
            cancel_on_ctrl_c(shutdown.clone());
            let results = app.run_once(&shutdown).await;
            Ok(!any_failed(&results))
        }
        Commands::Schedule { cron } => {
            let cron = cron.unwrap_or_else(|| config.schedule.cron.clone());
            let schedule: CronSchedule = cron.parse()?;
            let app = App::connect(config).await?;
            cancel_on_ctrl_c(shutdown.clone());
            run_scheduled(schedule, shutdown.clone(), || async {
                app.run_once(&shutdown).await;
            })
            .await;
            Ok(true)
        }
        Commands::Backfill {
            mapping,
            start,
            end,
        } => {
            if config.mapping(&mapping).is_none() {
                anyhow::bail!("Mapping not found: {mapping}");
            }
            let app = App::connect(config).await?;
            cancel_on_ctrl_c(shutdown.clone());
            let result = app.backfill(&mapping, &start, end.as_deref(), &shutdown).await?;
            info!("Backfill finished: {}", result.summary());
            Ok(!result.is_failed())
        }
    }
}
