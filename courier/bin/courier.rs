#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use courier::Courier;
use courier_common::{OutboundMessage, logging};
use courier_stats::Managed;

/// Relay mail through a queue and report delivery statistics
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(version)]
struct Cli {
    /// Configuration file (RON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Relay one or more RFC 5322 message files, then print the statistics
    Send {
        /// Message files to relay
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Seconds to wait for the delivery worker to drain the queue
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Print the monitoring schema of the delivery statistics
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            let statistics = courier_stats::DeliveryStatistics::new();
            println!("{}", serde_json::to_string_pretty(statistics.info())?);
            Ok(())
        }
        Commands::Send { files, wait } => {
            logging::init();
            let config = match find_config_file(cli.config)? {
                Some(path) => Courier::load(&path)?,
                None => Courier::default(),
            };

            send(config, &files, Duration::from_secs(wait)).await
        }
    }
}

async fn send(config: Courier, files: &[PathBuf], wait: Duration) -> anyhow::Result<()> {
    let worker_enabled = config.worker.enabled;
    let relay = config.start()?;
    let mut notifications = relay.statistics().subscribe();

    let mut queued = 0_usize;
    for file in files {
        let raw = std::fs::read(file)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;

        let message = match OutboundMessage::parse(&raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Skipping {}: {e}", file.display());
                continue;
            }
        };

        match relay.send(&message).await {
            Ok(()) => queued += 1,
            Err(e) => tracing::error!("Failed to relay {}: {e}", file.display()),
        }
    }

    if !relay.is_direct() && worker_enabled {
        let drained = tokio::time::timeout(wait, async {
            for _ in 0..queued {
                if notifications.recv().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!("Delivery worker did not drain the queue within {wait:?}");
        }
    }

    let attributes = relay.statistics().get_attributes(&[
        "statisticsCollectionStartDate",
        "countSuccessful",
        "countFailure",
        "lastSuccessfulMailInfo",
        "lastFailureMailInfo",
    ])?;
    let mut report = serde_json::Map::new();
    for attribute in attributes {
        report.insert(attribute.name, serde_json::to_value(attribute.value)?);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    relay.shutdown().await
}

/// Find the configuration file using the following precedence:
/// 1. `--config`
/// 2. `COURIER_CONFIG` environment variable
/// 3. ./courier.config.ron (current working directory)
/// 4. /etc/courier/courier.config.ron (system-wide config)
///
/// Nothing found means the built-in defaults are used.
fn find_config_file(flag: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = flag {
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Ok(env_path) = std::env::var("COURIER_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "COURIER_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./courier.config.ron"),
        PathBuf::from("/etc/courier/courier.config.ron"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
