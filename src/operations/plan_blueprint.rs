// src/operations/plan_blueprint.rs
// PlanBlueprint (spec 4.7 `initialize`): turns the user's query into a
// Blueprint plan plus an initial Phase. Not in the spec's named Operations
// table directly, but required by `Orchestrator::initialize` — grounded the
// same way as PlanNextPhase, its sibling.

use serde::Deserialize;
use tracing::info;

use crate::error::OrchestratorResult;
use crate::store::schema::{Blueprint, FileConcept, Phase};

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::UserContext;

#[derive(Debug, Deserialize)]
struct BlueprintReply {
    title: String,
    project_name: String,
    description: String,
    frameworks: Vec<String>,
    views: Vec<String>,
    user_flow: String,
    architecture: String,
    pitfalls: Vec<String>,
    implementation_roadmap: Vec<String>,
    color_palette: Vec<String>,
    initial_phase: InitialPhaseReply,
}

#[derive(Debug, Deserialize)]
struct InitialPhaseReply {
    name: String,
    description: String,
    files: Vec<FileConcept>,
}

const SYSTEM_PROMPT: &str = "You are a staff engineer planning a new web application. \
Given the user's request, produce a JSON blueprint with keys: title, project_name \
(lowercase, digits, hyphens/underscores only, 3-50 chars), description, frameworks, \
views, user_flow, architecture, pitfalls, implementation_roadmap, color_palette, and \
initial_phase {name, description, files:[{path, purpose, changes}]}. Reply with JSON only.";

pub async fn plan_blueprint(
    provider: &dyn ModelProvider,
    query: &str,
    user_context: &UserContext,
) -> OrchestratorResult<Blueprint> {
    info!("planning blueprint");
    let mut content = query.to_string();
    if !user_context.suggestions.is_empty() {
        content.push_str("\n\nAdditional context:\n");
        content.push_str(&user_context.suggestions.join("\n"));
    }

    let response = provider
        .complete(CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await?;

    let value = parse_json_reply(&response.text)?;
    let reply: BlueprintReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed blueprint reply: {e}")))?;

    Ok(Blueprint {
        title: reply.title,
        project_name: reply.project_name,
        description: reply.description,
        frameworks: reply.frameworks,
        views: reply.views,
        user_flow: reply.user_flow,
        architecture: reply.architecture,
        pitfalls: reply.pitfalls,
        implementation_roadmap: reply.implementation_roadmap,
        initial_phase: Phase {
            id: "phase-1".to_string(),
            name: reply.initial_phase.name,
            description: reply.initial_phase.description,
            files: reply.initial_phase.files,
            last_phase: false,
            completed: false,
        },
        color_palette: reply.color_palette,
    })
}
