// src/operations/regenerate_file.rs
// RegenerateFile (spec 4.6): regenerates one file up to 3 internal passes,
// stopping early once a pass reports no remaining issues.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::OrchestratorResult;

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::ImplementedFile;

const MAX_PASSES: usize = 3;

#[derive(Debug, Deserialize)]
struct RegenerateReply {
    contents: String,
    #[serde(default)]
    remaining_issues: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You are fixing a single source file. Given its current \
contents and a list of known issues, produce corrected contents. Reply with JSON: \
{\"contents\", \"remaining_issues\": [...]}. An empty remaining_issues array means the \
file is fixed.";

pub async fn regenerate_file(
    provider: &dyn ModelProvider,
    file: &ImplementedFile,
    issues: &[String],
) -> OrchestratorResult<ImplementedFile> {
    let mut current = file.clone();
    let mut remaining = issues.to_vec();

    for pass in 0..MAX_PASSES {
        if remaining.is_empty() {
            break;
        }
        info!(path = %current.path, pass, "regenerating file");

        let content = format!(
            "Path: {}\nPurpose: {}\nCurrent contents:\n{}\n\nIssues:\n{}",
            current.path,
            current.purpose,
            current.contents,
            remaining.join("\n")
        );
        let response = provider
            .complete(CompletionRequest {
                system: SYSTEM_PROMPT.to_string(),
                messages: vec![("user".to_string(), content)],
                expects_json: true,
            })
            .await?;

        let value = parse_json_reply(&response.text)?;
        let reply: RegenerateReply = serde_json::from_value(value).map_err(|e| {
            crate::error::OrchestratorError::Transient(format!("malformed regenerate reply: {e}"))
        })?;

        current.contents = reply.contents;
        remaining = reply.remaining_issues;
    }

    if !remaining.is_empty() {
        warn!(path = %current.path, count = remaining.len(), "file regeneration exhausted retries with issues remaining");
    }

    Ok(current)
}
