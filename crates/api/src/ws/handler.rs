use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use doodlewall_core::protocol::{ClientMessage, ServerMessage};
use doodlewall_pipeline::Submission;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// Drawing and display clients share the endpoint: every connection
/// receives `new_doodle` broadcasts and may send `submit_doodle` frames.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the broadcast hub.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound text frames on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.hub.on_connect(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                dispatch_text(&state, &conn_id, text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {
                tracing::debug!(conn_id = %conn_id, "Ignoring non-text frame");
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.hub.on_disconnect(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Handle one inbound text frame from `conn_id`.
///
/// A `submit_doodle` frame starts a detached submission task so a slow
/// normalization never stalls this connection's receive loop or anyone
/// else's. The outcome (`save_success` or `save_error`) goes back to the
/// submitter only. Frames that do not parse get a `save_error` reply.
///
/// Returns the submission task, if one was started.
pub fn dispatch_text(state: &AppState, conn_id: &str, text: &str) -> Option<JoinHandle<()>> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Malformed client frame");
            let reply = ServerMessage::save_error(format!("Malformed submission: {e}"));
            let ws_manager = state.ws_manager.clone();
            let conn_id = conn_id.to_string();
            return Some(tokio::spawn(async move {
                ws_manager
                    .send_to(&conn_id, Message::Text(reply.to_json().into()))
                    .await;
            }));
        }
    };

    match message {
        ClientMessage::SubmitDoodle(payload) => {
            let pipeline = state.pipeline.clone();
            let ws_manager = state.ws_manager.clone();
            let conn_id = conn_id.to_string();

            Some(tokio::spawn(async move {
                let reply = match pipeline.submit(Submission::new(payload.image)).await {
                    Ok(doodle) => ServerMessage::save_success(doodle.uri),
                    Err(e) => ServerMessage::save_error(e.client_message()),
                };
                if !ws_manager
                    .send_to(&conn_id, Message::Text(reply.to_json().into()))
                    .await
                {
                    tracing::debug!(conn_id = %conn_id, "Submitter left before acknowledgement");
                }
            }))
        }
    }
}
