// crates/server/src/main.rs
//! Proposal-desk server binary.
//!
//! Reads configuration from the environment, restores the last vectorization
//! status, and serves the API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use proposal_desk_observability::LogConfig;
use proposal_desk_server::stats::ChromaStatsProvider;
use proposal_desk_server::{build_job_runner, create_app, init_metrics, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = proposal_desk_observability::init(&LogConfig::from_env(
        "proposal-desk",
        "warn,proposal_desk_server=info,proposal_desk_jobs=info,tower_http=info",
    ))?;

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    init_metrics();

    eprintln!("\n\u{1f4c1} proposal-desk v{}\n", env!("CARGO_PKG_VERSION"));

    let jobs = Arc::new(build_job_runner(&config)?);
    let stats = Arc::new(ChromaStatsProvider::new(
        config.chroma.base_url(),
        config.chroma.collection.clone(),
        config.chroma.api_key.clone(),
    ));
    let state = AppState::new(Arc::clone(&jobs), stats);
    let app = create_app(state, &config.cors_origins);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        command = %config.vectorize.program,
        status_file = ?config.status_file,
        chroma = %config.chroma.base_url(),
        "Server listening"
    );
    eprintln!("  \u{2192} http://{}\n", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
