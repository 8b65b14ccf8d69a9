#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use doodlewall_api::config::ServerConfig;
use doodlewall_api::hub::BroadcastHub;
use doodlewall_api::router::build_app_router;
use doodlewall_api::state::AppState;
use doodlewall_api::ws::WsManager;
use doodlewall_core::settings::NormalizeSettings;
use doodlewall_core::store::DoodleStore;
use doodlewall_events::EventBus;
use doodlewall_pipeline::{FixedSettings, ImageNormalizer, SubmissionPipeline};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Build a test `ServerConfig` rooted at `doodle_dir`.
pub fn test_config(doodle_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        doodle_dir: doodle_dir.to_path_buf(),
        public_prefix: "/static/doodles".to_string(),
        max_images: 18,
        settings_path: doodle_dir.join("config.json"),
    }
}

/// A fully wired hub over a scratch doodle directory.
///
/// The broadcast hub forwarder is running; the directory lives as long as
/// this value.
pub struct TestHub {
    pub state: AppState,
    pub config: ServerConfig,
    pub event_bus: Arc<EventBus>,
    pub forwarder: JoinHandle<()>,
    pub dir: TempDir,
}

impl TestHub {
    /// The application router with the production middleware stack.
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone(), &self.config)
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Build a hub that normalizes to `settings`, after seeding the doodle
/// directory with `existing` file names.
pub async fn build_test_hub(settings: NormalizeSettings, existing: &[&str]) -> TestHub {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in existing {
        std::fs::write(dir.path().join(name), b"png").expect("seed file");
    }

    let config = test_config(dir.path());
    let store = Arc::new(DoodleStore::new(
        config.public_prefix.clone(),
        config.max_images,
    ));
    doodlewall_pipeline::scan::bootstrap_store(&store, dir.path()).await;

    let event_bus = Arc::new(EventBus::default());
    let pipeline = Arc::new(SubmissionPipeline::new(
        Arc::clone(&store),
        Arc::clone(&event_bus),
        Arc::new(ImageNormalizer::new(dir.path(), config.public_prefix.clone())),
        Arc::new(FixedSettings(settings)),
    ));

    let ws_manager = Arc::new(WsManager::new());
    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&ws_manager),
        Arc::clone(&store),
    ));
    let forwarder = tokio::spawn(Arc::clone(&hub).run(event_bus.subscribe()));

    let state = AppState {
        config: Arc::new(config.clone()),
        local_addr: SocketAddr::from(([127, 0, 0, 1], 5003)),
        store,
        pipeline,
        ws_manager,
        hub,
    };

    TestHub {
        state,
        config,
        event_bus,
        forwarder,
        dir,
    }
}

pub fn default_settings() -> NormalizeSettings {
    NormalizeSettings {
        resize_width: 64,
        resize_height: 48,
        image_quality: 100,
    }
}

/// Issue a GET request against `app`.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("infallible")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// A solid-colour PNG wrapped in a data URI.
pub fn png_data_uri(width: u32, height: u32) -> String {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner()))
}
