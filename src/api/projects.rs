// src/api/projects.rs
// `initialize` (spec 4.7) over HTTP: plans a Blueprint from a user's query
// and creates the project, returning its id for the caller to open a
// WebSocket against.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub project_id: String,
    pub project_name: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    let project_id = uuid::Uuid::new_v4().to_string();
    let session_id = uuid::Uuid::new_v4().to_string();
    let hostname = req.hostname.unwrap_or_else(|| "localhost".to_string());

    match state
        .create_project_from_query(
            project_id.clone(),
            req.user_id,
            session_id,
            hostname,
            req.query,
            req.images,
        )
        .await
    {
        Ok(orchestrator) => {
            let project_name = orchestrator.store.get().await.project_name;
            (StatusCode::CREATED, Json(CreateProjectResponse { project_id, project_name })).into_response()
        }
        Err(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() })))
                .into_response()
        }
    }
}
