use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doodlewall_api::config::ServerConfig;
use doodlewall_api::hub::BroadcastHub;
use doodlewall_api::router::build_app_router;
use doodlewall_api::state::AppState;
use doodlewall_api::ws;
use doodlewall_core::store::DoodleStore;
use doodlewall_events::EventBus;
use doodlewall_pipeline::scan::bootstrap_store;
use doodlewall_pipeline::{ImageNormalizer, JsonFileSettings, SubmissionPipeline};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doodlewall_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        doodle_dir = %config.doodle_dir.display(),
        settings_path = %config.settings_path.display(),
        max_images = config.max_images,
        "Loaded server configuration"
    );

    // --- Doodle store ---
    tokio::fs::create_dir_all(&config.doodle_dir)
        .await
        .expect("Failed to create doodle directory");

    let store = Arc::new(DoodleStore::new(
        config.public_prefix.clone(),
        config.max_images,
    ));
    let loaded = bootstrap_store(&store, &config.doodle_dir).await;
    tracing::info!(loaded, "Doodle history bootstrapped");

    // --- Event bus + submission pipeline ---
    let event_bus = Arc::new(EventBus::default());
    let pipeline = Arc::new(SubmissionPipeline::new(
        Arc::clone(&store),
        Arc::clone(&event_bus),
        Arc::new(ImageNormalizer::new(
            config.doodle_dir.clone(),
            config.public_prefix.clone(),
        )),
        Arc::new(JsonFileSettings::new(config.settings_path.clone())),
    ));

    // --- WebSocket manager + broadcast hub ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&ws_manager),
        Arc::clone(&store),
    ));
    let hub_handle = tokio::spawn(Arc::clone(&hub).run(event_bus.subscribe()));

    // --- Listener ---
    let listener = bind_with_fallback(&config).await;
    let local_addr = listener
        .local_addr()
        .expect("Failed to read bound address");

    // --- App state + router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        local_addr,
        store,
        pipeline,
        ws_manager: Arc::clone(&ws_manager),
        hub,
    };
    let app = build_app_router(state, &config);

    tracing::info!(%local_addr, "Doodle hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    hub_handle.abort();
    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Bind the configured address, or an OS-assigned port on the same host
/// if the preferred port is taken.
async fn bind_with_fallback(config: &ServerConfig) -> TcpListener {
    let ip = config.host.parse().expect("Invalid HOST address");
    let preferred = SocketAddr::new(ip, config.port);

    match TcpListener::bind(preferred).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            tracing::warn!(%preferred, "Port in use, falling back to a free port");
            TcpListener::bind(SocketAddr::new(ip, 0))
                .await
                .expect("Failed to bind fallback address")
        }
        Err(e) => panic!("Failed to bind to {preferred}: {e}"),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
