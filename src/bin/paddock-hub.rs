//! Telemetry hub: ingest over HTTP, websocket fan-out, batched persistence

use anyhow::Context;
use paddock::{Paddock, PaddockConfig, store};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PaddockConfig::from_env().context("loading configuration")?;
    let hub_config = config.hub;

    let listener = TcpListener::bind(&hub_config.listen_addr)
        .await
        .with_context(|| format!("binding {}", hub_config.listen_addr))?;

    let hub = Paddock::hub(&hub_config, store::from_config(&hub_config.store));

    // Stop the control loop as soon as the signal arrives so subscriber
    // sockets get their close frames while the server drains
    let handle = hub.handle().clone();
    hub.serve(listener, async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
        handle.shutdown();
    })
    .await?;

    let report = hub.shutdown().await;
    info!(
        payloads = report.hub.payloads,
        dropped_batches = report.hub.dropped_batches,
        persisted = report.worker.persisted,
        failed = report.worker.failed,
        "Hub exited"
    );
    Ok(())
}
