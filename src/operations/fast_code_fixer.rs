// src/operations/fast_code_fixer.rs
// FastCodeFixer (spec 4.6): a smart LLM-backed fixer that patches a subset
// of the project's files in response to a free-text query and a list of
// known issues. Contrast with DeterministicFixer, which never calls a model.

use serde::Deserialize;
use tracing::info;

use crate::error::OrchestratorResult;

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::ImplementedFile;

#[derive(Debug, Deserialize)]
struct FixedFileReply {
    path: String,
    contents: String,
    purpose: String,
}

#[derive(Debug, Deserialize)]
struct FastFixReply {
    files: Vec<FixedFileReply>,
}

const SYSTEM_PROMPT: &str = "You are quickly patching a web application in response to a \
user query and known static-analysis issues. Return only the files that need changes. \
Reply with JSON: {\"files\": [{\"path\",\"contents\",\"purpose\"}]}.";

pub async fn fast_code_fixer(
    provider: &dyn ModelProvider,
    query: &str,
    issues: &[String],
    all_files: &std::collections::HashMap<String, String>,
) -> OrchestratorResult<Vec<ImplementedFile>> {
    info!(issue_count = issues.len(), "running fast code fixer");

    let manifest = all_files.keys().cloned().collect::<Vec<_>>().join("\n");
    let content = format!(
        "Query: {query}\n\nIssues:\n{}\n\nKnown files:\n{manifest}",
        issues.join("\n")
    );

    let response = provider
        .complete(CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await?;

    let value = parse_json_reply(&response.text)?;
    let reply: FastFixReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed fast-fix reply: {e}")))?;

    Ok(reply
        .files
        .into_iter()
        .map(|f| ImplementedFile {
            path: f.path,
            contents: f.contents,
            purpose: f.purpose,
        })
        .collect())
}
