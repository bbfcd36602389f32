// src/api/actions.rs
// HTTP surface for Orchestrator operations that aren't part of the WS
// protocol (spec 4.9's client -> agent list is closed; `deepDebug` and
// `captureScreenshot` are still part of the Orchestrator API per spec 4.7,
// reached here instead).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct DeepDebugRequest {
    pub issue: String,
    #[serde(default)]
    pub focus_paths: Vec<String>,
}

pub async fn deep_debug(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<DeepDebugRequest>,
) -> impl IntoResponse {
    let orchestrator = match state.orchestrator(&project_id).await {
        Ok(o) => o,
        Err(err) => {
            return (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": err.to_string() })))
                .into_response()
        }
    };

    match orchestrator.deep_debug(&req.issue, &req.focus_paths).await {
        Ok(transcript) => (StatusCode::OK, Json(serde_json::json!({ "transcript": transcript }))).into_response(),
        Err(err) => {
            (StatusCode::CONFLICT, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
        }
    }
}

pub async fn capture_screenshot(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let orchestrator = match state.orchestrator(&project_id).await {
        Ok(o) => o,
        Err(err) => {
            return (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": err.to_string() })))
                .into_response()
        }
    };

    match orchestrator.capture_screenshot().await {
        Ok(url) => (StatusCode::OK, Json(serde_json::json!({ "url": url }))).into_response(),
        Err(err) => {
            (StatusCode::BAD_GATEWAY, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
        }
    }
}
