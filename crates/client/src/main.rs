// crates/client/src/main.rs
//! Command-line client for the proposal-desk server.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proposal_desk_client::poller::{DEFAULT_CEILING, DEFAULT_INTERVAL};
use proposal_desk_client::{trigger_and_wait, HttpVectorizationApi, PollConfig, VectorizationApi};
use proposal_desk_observability::LogConfig;
use tokio_util::sync::CancellationToken;

/// Trigger and monitor vectorization runs
#[derive(Parser, Debug)]
#[command(name = "proposal-desk-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server root URL
    #[arg(long = "base-url", default_value = "http://localhost:8000")]
    base_url: String,

    /// Seconds between status polls
    #[arg(long = "interval-secs", default_value_t = DEFAULT_INTERVAL.as_secs())]
    interval_secs: u64,

    /// Seconds to wait for a run before giving up
    #[arg(long = "timeout-secs", default_value_t = DEFAULT_CEILING.as_secs())]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a run and wait for it to finish
    Vectorize,
    /// Print the current status record
    Status,
    /// Print vector-database collection statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = proposal_desk_observability::init(&LogConfig::from_env(
        "proposal-desk-cli",
        "warn,proposal_desk_client=info",
    ))?;

    let api = Arc::new(HttpVectorizationApi::new(&cli.base_url)?);

    match cli.command {
        Command::Status => {
            let status = api.status().await.context("fetching status")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let stats = api.stats().await.context("fetching vector stats")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Vectorize => {
            anyhow::ensure!(cli.interval_secs > 0, "--interval-secs must be at least 1");
            let config = PollConfig::new(
                Duration::from_secs(cli.interval_secs),
                Duration::from_secs(cli.timeout_secs),
            );

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let outcome = trigger_and_wait(api, config, cancel)
                .await
                .context("triggering vectorization")?;
            println!("{}", outcome.user_message());
            Ok(ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1)))
        }
    }
}
