// src/api/mod.rs
// Router assembly: project-creation HTTP endpoint, per-project WebSocket
// upgrade, health probes, and the metrics endpoint.

pub mod actions;
pub mod health;
pub mod projects;
pub mod ws_handler;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/projects", post(projects::create_project))
        .route("/projects/:project_id/ws", get(ws_handler::upgrade))
        .route("/projects/:project_id/deep-debug", post(actions::deep_debug))
        .route("/projects/:project_id/screenshot", post(actions::capture_screenshot))
        .with_state(state)
}
