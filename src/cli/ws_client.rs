// src/cli/ws_client.rs
// WebSocket client for connecting to the orchestrator (spec 4.9). Grounded
// on the teacher's `ws_client.rs` MiraClient: connect, split the stream,
// spawn a receive task that forwards parsed messages over an mpsc channel,
// keep the send half behind a mutex for outgoing `ClientMessage`s.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::broadcaster::{ClientMessage, ServerMessage};

type WsSender = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct ForgeClient {
    sender: Arc<Mutex<WsSender>>,
    pub events: mpsc::Receiver<ServerMessage>,
}

impl ForgeClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        let (sender, mut receiver) = stream.split();
        let sender = Arc::new(Mutex::new(sender));

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            if tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!(%err, "failed to parse server message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "WS receive error");
                        break;
                    }
                }
            }
        });

        Ok(Self { sender, events: rx })
    }

    pub async fn send(&self, msg: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(msg)?;
        self.sender.lock().await.send(Message::Text(text.into())).await?;
        Ok(())
    }
}
