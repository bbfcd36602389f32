// src/broadcaster/mod.rs
// Broadcaster (spec 4.9): fans out `ServerMessage`s to every client attached
// to a project. One-way agent->client streaming plus the bidirectional
// request/response pattern (a client send dispatched by MessageRouter, with
// the orchestrator's reply delivered back through the same broadcast path).

pub mod connection;
pub mod heartbeat;
pub mod message;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

pub use connection::Connection;
pub use message::{ClientMessage, ServerMessage};

/// Fans `ServerMessage`s out to every connection currently attached to a
/// project. Connections that report closed are pruned lazily on the next
/// broadcast.
#[derive(Default)]
pub struct Broadcaster {
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, connection: Arc<Connection>) {
        connection.start_heartbeat();
        self.connections.write().await.push(connection);
    }

    /// Sends `msg` to every attached connection (spec 4.9: "On every state
    /// mutation it sends `cf_agent_state{state}`", the general broadcast
    /// case every other event also uses).
    pub async fn broadcast(&self, msg: ServerMessage) {
        let connections = self.connections.read().await.clone();
        let original_count = connections.len();
        let mut still_open = Vec::with_capacity(original_count);
        for conn in connections {
            if conn.is_closed().await {
                continue;
            }
            if conn.send(&msg).await.is_ok() {
                still_open.push(conn);
            }
        }
        if still_open.len() != original_count {
            debug!(remaining = still_open.len(), "pruned closed connections");
        }
        *self.connections.write().await = still_open;
    }
}
