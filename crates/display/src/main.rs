//! `doodlewall-display` -- headless display client.
//!
//! Attaches to a doodle hub, runs the preview queue and grid placer, and
//! logs every render operation. Reads `reset` / `resize WxH` controls from
//! stdin.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doodlewall_display::client::{self, HubClient};
use doodlewall_display::config::DisplayConfig;
use doodlewall_display::controls::read_controls;
use doodlewall_display::reconnect::ReconnectConfig;
use doodlewall_display::{DisplayScheduler, TracingRenderer};

/// Buffered scheduler commands before senders wait.
const COMMAND_BUFFER: usize = 256;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doodlewall_display=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DisplayConfig::from_env();
    tracing::info!(
        hub_url = %config.hub_url,
        width = config.viewport.width,
        height = config.viewport.height,
        max_images = config.grid.max_images,
        dwell_ms = config.dwell.as_millis() as u64,
        "Starting display client"
    );

    let hub = HubClient::new(config.hub_url.clone()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build hub client");
        std::process::exit(1);
    });

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let scheduler = DisplayScheduler::new(config.scheduler(), TracingRenderer);
    let scheduler_handle = tokio::spawn(scheduler.run(rx));
    let controls_handle = tokio::spawn(read_controls(tx.clone()));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        ctrl_c_cancel.cancel();
    });

    client::run(&hub, tx, ReconnectConfig::default(), cancel).await;

    controls_handle.abort();
    let _ = scheduler_handle.await;
    tracing::info!("Display client stopped");
}
