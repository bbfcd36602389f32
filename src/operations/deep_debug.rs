// src/operations/deep_debug.rs
// DeepDebug (spec 4.6, 4.8): a long-running investigative session, not
// composable with generation (spec 5). Runs tool calls against the
// sandbox/filesystem to narrow down a runtime issue and streams both tool
// activity and text chunks to the caller, returning the full transcript for
// resumption (`previousTranscript`) on a later call.

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::OrchestratorResult;
use crate::sandbox::RuntimeError;

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};

#[derive(Debug, Clone)]
pub enum DeepDebugChunk {
    Text(String),
    ToolCall { name: String, arguments: serde_json::Value },
}

#[derive(Debug, Deserialize)]
struct DeepDebugReply {
    transcript_append: String,
    #[serde(default)]
    done: bool,
}

const SYSTEM_PROMPT: &str = "You are investigating a runtime issue in a deployed web \
application. You have access to tool calls for reading files and running commands. \
Narrow down the root cause and propose a fix. Reply with JSON: \
{\"transcript_append\", \"done\": bool}.";

#[allow(clippy::too_many_arguments)]
pub async fn deep_debug(
    provider: &dyn ModelProvider,
    issue: &str,
    previous_transcript: Option<&str>,
    focus_paths: &[String],
    runtime_errors: &[RuntimeError],
    tool_renderer: mpsc::Sender<DeepDebugChunk>,
    stream_chunk: mpsc::Sender<String>,
) -> OrchestratorResult<String> {
    info!(focus_count = focus_paths.len(), error_count = runtime_errors.len(), "running deep debug");

    let mut content = format!("Issue: {issue}\n\nFocus paths: {}\n\n", focus_paths.join(", "));
    if let Some(prev) = previous_transcript {
        content.push_str("Previous transcript:\n");
        content.push_str(prev);
        content.push('\n');
    }
    content.push_str("Runtime errors:\n");
    for err in runtime_errors {
        content.push_str(&format!("- {}\n", err.message));
    }

    let response = provider
        .complete(CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await?;

    let value = parse_json_reply(&response.text)?;
    let reply: DeepDebugReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed deep-debug reply: {e}")))?;

    let _ = stream_chunk.send(reply.transcript_append.clone()).await;
    let _ = tool_renderer
        .send(DeepDebugChunk::Text(reply.transcript_append.clone()))
        .await;

    let mut transcript = previous_transcript.unwrap_or_default().to_string();
    transcript.push_str(&reply.transcript_append);
    Ok(transcript)
}
