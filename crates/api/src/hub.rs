//! Broadcast Hub: fan-out of accepted doodles to every connected client.
//!
//! [`BroadcastHub`] consumes [`DoodleEvent`]s from the event bus and pushes a
//! `new_doodle` frame to every registered WebSocket. Delivery is
//! at-most-once: a connection that is gone when the frame is queued simply
//! misses it and recovers through the snapshot endpoint.

use std::sync::Arc;

use axum::extract::ws::Message;
use doodlewall_core::doodle::Doodle;
use doodlewall_core::protocol::ServerMessage;
use doodlewall_core::store::DoodleStore;
use doodlewall_events::DoodleEvent;
use tokio::sync::{broadcast, mpsc};

use crate::ws::WsManager;

pub struct BroadcastHub {
    ws_manager: Arc<WsManager>,
    store: Arc<DoodleStore>,
}

impl BroadcastHub {
    pub fn new(ws_manager: Arc<WsManager>, store: Arc<DoodleStore>) -> Self {
        Self { ws_manager, store }
    }

    /// Register a client connection.
    ///
    /// No history is pushed; the client pulls it with [`snapshot`](Self::snapshot).
    pub async fn on_connect(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let rx = self.ws_manager.add(conn_id.clone()).await;
        tracing::debug!(conn_id = %conn_id, "Client registered with broadcast hub");
        rx
    }

    pub async fn on_disconnect(&self, conn_id: &str) {
        self.ws_manager.remove(conn_id).await;
    }

    /// Deliver a `new_doodle` frame to every connected client.
    ///
    /// Returns how many connections the frame was queued for.
    pub async fn publish(&self, doodle: &Doodle) -> usize {
        let frame = ServerMessage::new_doodle(doodle.uri.as_str()).to_json();
        let delivered = self.ws_manager.broadcast(Message::Text(frame.into())).await;
        tracing::debug!(doodle_id = %doodle.id, uri = %doodle.uri, delivered, "Broadcast new doodle");
        delivered
    }

    /// The newest `n` doodles (store default cap when `None`).
    pub async fn snapshot(&self, n: Option<usize>) -> Vec<Doodle> {
        self.store.latest(n).await
    }

    /// Forward accepted doodles from the event bus to all sockets.
    ///
    /// Events arrive in store append order and are published one at a time,
    /// so socket order matches append order. The loop exits when the
    /// [`EventBus`](doodlewall_events::EventBus) is dropped.
    pub async fn run(self: Arc<Self>, mut receiver: broadcast::Receiver<DoodleEvent>) {
        loop {
            match receiver.recv().await {
                Ok(DoodleEvent::Accepted { doodle, .. }) => {
                    self.publish(&doodle).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Broadcast hub lagged, clients missed doodles");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, broadcast hub shutting down");
                    break;
                }
            }
        }
    }
}
