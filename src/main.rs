//! Chartify Web - Data Upload & Interactive Chart Dashboard
//!
//! Serves the dashboard page and its JSON API.

use anyhow::{Context, Result};
use chartify_web::web::{create_router, AppState};
use chartify_web::{Dashboard, ServerArgs};
use clap::Parser;
use std::io;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = args.dashboard_config().context("invalid configuration")?;
    let chart_set = config.chart_set;
    let dashboard = Dashboard::new(config).context("failed to build sample dataset")?;
    let app = create_router(AppState::new(dashboard));

    let addr = args.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, ?chart_set, "chartify dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
