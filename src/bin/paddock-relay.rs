//! Producer relay: samples the simulator and pushes batches to a hub

use anyhow::Context;
use paddock::{Paddock, PaddockConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PaddockConfig::from_env().context("loading configuration")?;
    let relay = Paddock::relay(&config.relay).context("starting relay")?;

    let cancel = relay.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            cancel.cancel();
        }
    });

    let stats = relay.finished().await;
    info!(
        samples = stats.samples,
        frames = stats.frames,
        batches_sent = stats.batches_sent,
        batches_failed = stats.batches_failed,
        source_errors = stats.source_errors,
        "Relay exited"
    );
    Ok(())
}
