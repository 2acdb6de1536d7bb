use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;

use routes::{app, AppState, PROM};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,concord_router=debug,concord_core=debug".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    let policy = config::load()?;
    tracing::info!(
        outlier_threshold = policy.outlier_threshold,
        cluster_threshold = policy.cluster_threshold,
        verification_threshold = policy.verification.base_threshold,
        "consensus policy loaded"
    );
    let handle = PrometheusBuilder::new().install_recorder().context("installing prometheus recorder")?;
    if PROM.set(handle).is_err() {
        tracing::warn!("prometheus handle already set");
    }

    let state = AppState { config: Arc::new(policy) };
    let addr = config::listen_addr()?;
    tracing::info!(%addr, "router listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
