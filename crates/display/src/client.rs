//! Hub connection for a display client.
//!
//! On every (re)connect the client opens the WebSocket first, then pulls the
//! `latest-doodles` snapshot, so nothing appended in between is missed. A
//! doodle may show up in both; the scheduler tolerates that. Broadcasts are
//! forwarded to the scheduler as [`DisplayCommand::NewDoodle`].

use std::time::Duration;

use doodlewall_core::protocol::{LatestDoodles, ServerMessage};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::reconnect::{next_delay, ReconnectConfig};
use crate::scheduler::DisplayCommand;

pub type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timeout for the snapshot request.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while talking to the hub.
#[derive(Debug, thiserror::Error)]
pub enum DisplayClientError {
    /// Could not open or keep the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The hub sent a frame this client does not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The snapshot request failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Connection handle for one hub.
pub struct HubClient {
    base_url: String,
    http: reqwest::Client,
}

impl HubClient {
    /// * `base_url` - hub HTTP base URL, e.g. `http://host:5003`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DisplayClientError> {
        let http = reqwest::Client::builder()
            .timeout(SNAPSHOT_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| DisplayClientError::Connection(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// WebSocket endpoint derived from the base URL.
    pub fn ws_url(&self) -> Result<String, DisplayClientError> {
        let base = &self.base_url;
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.clone()
        } else {
            return Err(DisplayClientError::Connection(format!(
                "Unsupported hub URL scheme: {base}"
            )));
        };
        Ok(format!("{ws_base}/ws"))
    }

    /// Fetch the newest-first snapshot.
    pub async fn fetch_latest(&self) -> Result<Vec<String>, DisplayClientError> {
        let url = format!("{}/get_latest_doodles", self.base_url);
        let latest: LatestDoodles = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DisplayClientError::Snapshot(e.to_string()))?
            .json()
            .await
            .map_err(|e| DisplayClientError::Snapshot(e.to_string()))?;
        Ok(latest.doodles)
    }

    pub async fn connect(&self) -> Result<HubStream, DisplayClientError> {
        let url = self.ws_url()?;
        let (stream, _response) = connect_async(&url).await.map_err(|e| {
            DisplayClientError::Connection(format!("Failed to connect to hub at {url}: {e}"))
        })?;
        tracing::info!(url = %url, "Connected to hub");
        Ok(stream)
    }

    /// Connect, then hand the snapshot to the scheduler.
    async fn connect_and_sync(
        &self,
        commands: &mpsc::Sender<DisplayCommand>,
    ) -> Result<HubStream, DisplayClientError> {
        let stream = self.connect().await?;
        let doodles = self.fetch_latest().await?;
        tracing::info!(count = doodles.len(), "Fetched latest doodles");
        commands
            .send(DisplayCommand::Snapshot(doodles))
            .await
            .map_err(|_| DisplayClientError::Connection("scheduler stopped".into()))?;
        Ok(stream)
    }
}

/// Extract the doodle URI from a hub frame.
///
/// Returns `Ok(None)` for frames meant for drawing clients.
pub fn parse_frame(text: &str) -> Result<Option<String>, DisplayClientError> {
    let message: ServerMessage =
        serde_json::from_str(text).map_err(|e| DisplayClientError::Protocol(e.to_string()))?;
    match message {
        ServerMessage::NewDoodle(payload) => Ok(Some(payload.image)),
        ServerMessage::SaveSuccess(_) | ServerMessage::SaveError(_) => Ok(None),
    }
}

/// Forward broadcasts from one connection until it drops.
async fn run_session(
    mut stream: HubStream,
    commands: &mpsc::Sender<DisplayCommand>,
) -> Result<(), DisplayClientError> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match parse_frame(&text) {
                Ok(Some(uri)) => {
                    tracing::debug!(uri = %uri, "New doodle received");
                    if commands.send(DisplayCommand::NewDoodle(uri)).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable frame"),
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Hub closed WebSocket");
                return Ok(());
            }
            Ok(_) => {
                // Ping/Pong handled by tungstenite; binary ignored.
            }
            Err(e) => return Err(DisplayClientError::Connection(e.to_string())),
        }
    }
    Ok(())
}

/// Keep a display client attached to the hub until `cancel` fires or the
/// scheduler stops.
///
/// Failed attempts back off exponentially; a session that ends after a
/// successful connect restarts from the initial delay.
pub async fn run(
    client: &HubClient,
    commands: mpsc::Sender<DisplayCommand>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut delay = reconnect.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = client.connect_and_sync(&commands) => result,
        };

        match connected {
            Ok(stream) => {
                attempt = 0;
                delay = reconnect.initial_delay;

                let ended = tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = run_session(stream, &commands) => result,
                };
                if let Err(e) = ended {
                    tracing::warn!(error = %e, "Hub session ended");
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Hub connection attempt failed"
                );
            }
        }

        if commands.is_closed() {
            tracing::info!("Scheduler stopped, leaving hub");
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if attempt > 0 {
            delay = next_delay(delay, &reconnect);
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn ws_url_from_http_base() {
        let client = HubClient::new("http://10.0.0.5:5003/").unwrap();
        assert_eq!(client.ws_url().unwrap(), "ws://10.0.0.5:5003/ws");
    }

    #[test]
    fn ws_url_from_https_base() {
        let client = HubClient::new("https://wall.example").unwrap();
        assert_eq!(client.ws_url().unwrap(), "wss://wall.example/ws");
    }

    #[test]
    fn ws_url_rejects_unknown_scheme() {
        let client = HubClient::new("ftp://wall.example").unwrap();
        assert_matches!(client.ws_url(), Err(DisplayClientError::Connection(_)));
    }

    #[test]
    fn new_doodle_frame_yields_uri() {
        let frame = r#"{"event":"new_doodle","data":{"image":"/static/doodles/doodle_1.png"}}"#;
        assert_eq!(
            parse_frame(frame).unwrap(),
            Some("/static/doodles/doodle_1.png".to_string())
        );
    }

    #[test]
    fn submitter_frames_are_ignored() {
        let frame = r#"{"event":"save_success","data":{"filePath":"/x.png"}}"#;
        assert_eq!(parse_frame(frame).unwrap(), None);
    }

    #[test]
    fn garbage_frame_is_protocol_error() {
        assert_matches!(parse_frame("nope"), Err(DisplayClientError::Protocol(_)));
    }
}
