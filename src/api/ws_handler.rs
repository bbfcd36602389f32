// src/api/ws_handler.rs
// WebSocket upgrade + receive loop (spec 4.9): one connection per project.
// Grounded on `api/ws/chat/mod.rs`'s `ws_chat_handler`/`handle_socket`
// shape (JWT-from-query-param upgrade, split sender/receiver, a receive
// loop dispatching parsed client messages into a router), generalized from
// a single global chat session to one `Orchestrator` per `project_id`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::verify_token;
use crate::broadcaster::{ClientMessage, Connection};
use crate::router::MessageRouter;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Path(project_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let user_id = query.token.as_deref().and_then(|token| match verify_token(token) {
        Ok(claims) => Some(claims.sub),
        Err(err) => {
            warn!(%err, "invalid WS token from {addr}, proceeding anonymously");
            None
        }
    });

    ws.on_upgrade(move |socket| handle_socket(socket, app_state, project_id, addr, user_id))
}

async fn handle_socket(
    socket: WebSocket,
    app_state: AppState,
    project_id: String,
    addr: SocketAddr,
    user_id: Option<String>,
) {
    info!(%project_id, %addr, ?user_id, "WebSocket connected");

    let orchestrator = match app_state.orchestrator(&project_id).await {
        Ok(o) => o,
        Err(err) => {
            warn!(%err, %project_id, "failed to load project for WS connection");
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let connection = Arc::new(Connection::new(sender));
    orchestrator.send_agent_connected(&connection).await;
    orchestrator.broadcaster.attach(connection.clone()).await;
    crate::metrics::connection_opened();

    let router = MessageRouter::new(orchestrator);

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => router.route(msg).await,
                Err(err) => warn!(%err, "failed to parse client message"),
            },
            Ok(Message::Close(_)) => {
                info!(%project_id, "client closed connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "WS receive error");
                break;
            }
        }
    }

    connection.mark_closed().await;
    crate::metrics::connection_closed();
}
