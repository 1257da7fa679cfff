//! docrest HTTP server.
//!
//! Serves the document CRUD API over the store picked with `--backend`:
//!
//! ```text
//! docrest --backend mongodb --mongo-uri mongodb://localhost:27017 --database python_api_db
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docrest_server::{AppState, build_router, config::Args};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!(backend = ?args.backend, "docrest starting...");
    let store = Arc::new(args.connect().await?);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(AppState::new(store.clone())))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    store.shutdown().await?;
    info!("docrest stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
