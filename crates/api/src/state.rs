use std::net::SocketAddr;
use std::sync::Arc;

use doodlewall_core::store::DoodleStore;
use doodlewall_pipeline::SubmissionPipeline;

use crate::config::ServerConfig;
use crate::hub::BroadcastHub;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Address the listener actually bound to (may differ from the
    /// configured port after fallback).
    pub local_addr: SocketAddr,
    /// Newest-first doodle history.
    pub store: Arc<DoodleStore>,
    /// Submission pipeline (the store's only writer).
    pub pipeline: Arc<SubmissionPipeline>,
    /// WebSocket connection manager (drawing and display clients).
    pub ws_manager: Arc<WsManager>,
    /// Fan-out of accepted doodles and snapshot reads.
    pub hub: Arc<BroadcastHub>,
}
