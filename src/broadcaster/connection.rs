// src/broadcaster/connection.rs
// Adapted from `api/ws/chat/connection.rs`: a single WebSocket connection's
// send half, guarded so a send after close is a no-op rather than a panic
// or a confusing tungstenite error surfacing up the call stack.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::heartbeat::{HeartbeatManager, StatusSender};
use super::message::ServerMessage;
use crate::error::OrchestratorResult;

pub struct Connection {
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    last_any_send: Arc<Mutex<Instant>>,
    is_closed: Arc<Mutex<bool>>,
    heartbeat: Arc<HeartbeatManager<ConnectionStatusSender>>,
}

struct ConnectionStatusSender {
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    is_closed: Arc<Mutex<bool>>,
}

impl StatusSender for ConnectionStatusSender {
    fn send_status(&self, message: &str) {
        let sender = self.sender.clone();
        let is_closed = self.is_closed.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            if *is_closed.lock().await {
                return;
            }
            let mut guard = sender.lock().await;
            if let Err(err) = guard.send(Message::Text(Utf8Bytes::from(message))).await {
                warn!(%err, "heartbeat send failed, connection likely closed");
            }
        });
    }
}

impl Connection {
    /// Takes the send half of an already-split `WebSocket` (the receive
    /// half stays with the caller's receive loop — spec 4.9's WS handler
    /// owns dispatching incoming `ClientMessage`s into `MessageRouter`).
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        let sender = Arc::new(Mutex::new(sender));
        let is_closed = Arc::new(Mutex::new(false));

        let status_sender = ConnectionStatusSender {
            sender: sender.clone(),
            is_closed: is_closed.clone(),
        };
        let heartbeat = Arc::new(HeartbeatManager::new(Arc::new(status_sender)));

        Self {
            sender,
            last_any_send: Arc::new(Mutex::new(Instant::now())),
            is_closed,
            heartbeat,
        }
    }

    pub async fn mark_closed(&self) {
        *self.is_closed.lock().await = true;
        self.heartbeat.stop();
        debug!("connection marked closed, heartbeat stopped");
    }

    pub async fn is_closed(&self) -> bool {
        *self.is_closed.lock().await
    }

    pub async fn send(&self, msg: &ServerMessage) -> OrchestratorResult<()> {
        if self.is_closed().await {
            return Ok(());
        }
        let json = serde_json::to_string(msg)?;
        let mut sender = self.sender.lock().await;
        if let Err(err) = sender.send(Message::Text(Utf8Bytes::from(json))).await {
            warn!(%err, "send failed, marking connection closed");
            drop(sender);
            self.mark_closed().await;
            return Ok(());
        }
        drop(sender);
        *self.last_any_send.lock().await = Instant::now();
        Ok(())
    }

    pub fn start_heartbeat(&self) {
        self.heartbeat.start(Duration::from_secs(15));
    }
}
