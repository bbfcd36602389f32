// src/operations/user_converse.rs
// UserConverse (spec 4.6): drives the conversational turn that answers a
// user message, optionally invoking tools (spec 4.8's command sub-algorithm
// reuses the same tool surface). `responseCallback` streams partial text to
// the caller as it arrives; here that's an mpsc sender of string chunks.

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::OrchestratorResult;

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::UserConverseResult;

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ConverseReply {
    response: String,
    #[serde(default)]
    conversation_state: serde_json::Value,
}

const SYSTEM_PROMPT: &str = "You are the conversational layer of a web-application build \
agent. Given the user's message, the current project state, known runtime errors, and \
accumulated project-update notes, produce a helpful reply. Reply with JSON: \
{\"response\", \"conversation_state\"}.";

#[allow(clippy::too_many_arguments)]
pub async fn user_converse(
    provider: &dyn ModelProvider,
    user_message: &str,
    state_summary: &str,
    errors: &[String],
    project_updates: &[String],
    uploaded_images: &[String],
    response_stream: mpsc::Sender<String>,
    tools: &[ToolSpec],
) -> OrchestratorResult<UserConverseResult> {
    info!(tool_count = tools.len(), image_count = uploaded_images.len(), "running user converse");

    let content = format!(
        "User message: {user_message}\n\nProject state:\n{state_summary}\n\nRuntime errors:\n{}\n\nProject updates:\n{}",
        errors.join("\n"),
        project_updates.join("\n"),
    );

    let response = provider
        .complete(CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await?;

    let value = parse_json_reply(&response.text)?;
    let reply: ConverseReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed converse reply: {e}")))?;

    let _ = response_stream.send(reply.response.clone()).await;

    Ok(UserConverseResult {
        user_response: reply.response,
        new_conversation_state: reply.conversation_state,
    })
}
