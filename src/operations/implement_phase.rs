// src/operations/implement_phase.rs
// ImplementPhase (spec 4.6): generates the files for one Phase, streaming
// file-level and chunk-level events to the caller. Events are emitted on an
// mpsc channel ordered per-path (SPEC_FULL Open Question decision: rather
// than interleaving chunks from concurrently-generated files, each file's
// chunks are emitted back-to-back before the next file starts, so a
// MessageRouter subscriber never has to reassemble out-of-order chunks).

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::OrchestratorResult;
use crate::store::schema::{AgentMode, FileConcept};

use super::fast_code_fixer::fast_code_fixer;
use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::{
    ImplementPhaseEvent, ImplementPhaseResult, ImplementedFile, OperationContext, UserContext,
};

#[derive(Debug, Deserialize)]
struct FileReply {
    path: String,
    contents: String,
    purpose: String,
}

#[derive(Debug, Deserialize)]
struct PhaseImplementationReply {
    files: Vec<FileReply>,
    #[serde(default)]
    commands: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You are implementing one phase of a web application build. \
Given the phase's file manifest, the current repository contents, and known issues, \
produce the full contents of every file the manifest lists (skip files marked for \
deletion). Reply with JSON: {\"files\": [{\"path\",\"contents\",\"purpose\"}], \
\"commands\": [...]}.";

const CHUNK_SIZE: usize = 4000;

pub async fn implement_phase(
    provider: &dyn ModelProvider,
    ctx: &OperationContext,
    files: &[FileConcept],
    issues: &[String],
    is_first_phase: bool,
    user_context: &UserContext,
    events: mpsc::Sender<ImplementPhaseEvent>,
) -> OrchestratorResult<ImplementPhaseResult> {
    info!(file_count = files.len(), is_first_phase, "implementing phase");

    let manifest = files
        .iter()
        .filter(|f| !f.is_delete())
        .map(|f| format!("- {} ({})", f.path, f.purpose))
        .collect::<Vec<_>>()
        .join("\n");
    let mut content = format!("Phase file manifest:\n{manifest}\n\nKnown issues:\n{}\n", issues.join("\n"));
    if !user_context.suggestions.is_empty() {
        content.push_str("\nUser notes:\n");
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
    let reply: PhaseImplementationReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed implementation reply: {e}")))?;

    let mut implemented = Vec::with_capacity(reply.files.len());
    for file in reply.files {
        let _ = events
            .send(ImplementPhaseEvent::FileGenerating { path: file.path.clone() })
            .await;
        for chunk in file.contents.as_bytes().chunks(CHUNK_SIZE) {
            let chunk_text = String::from_utf8_lossy(chunk).to_string();
            let _ = events
                .send(ImplementPhaseEvent::FileChunkGenerated {
                    path: file.path.clone(),
                    chunk: chunk_text,
                })
                .await;
        }
        debug!(path = %file.path, "file generated");
        let _ = events
            .send(ImplementPhaseEvent::FileGenerated { path: file.path.clone() })
            .await;
        implemented.push(ImplementedFile {
            path: file.path,
            contents: file.contents,
            purpose: file.purpose,
        });
    }

    let realtime_fixed_paths = if ctx.state.agent_mode == AgentMode::Smart {
        apply_realtime_fixes(provider, issues, &mut implemented).await
    } else {
        Vec::new()
    };

    Ok(ImplementPhaseResult {
        deployment_needed: !implemented.is_empty(),
        files: implemented,
        commands: reply.commands,
        realtime_fixed_paths,
    })
}

/// `agentMode == smart` (spec 6): patches each freshly generated file
/// concurrently against the same known issues used to implement the phase,
/// in real time rather than waiting for a later static-analysis pass. Every
/// file's fix request runs concurrently; none of them block the others from
/// completing.
async fn apply_realtime_fixes(
    provider: &dyn ModelProvider,
    issues: &[String],
    implemented: &mut [ImplementedFile],
) -> Vec<String> {
    let fixes = futures::future::join_all(implemented.iter().map(|file| {
        let mut single = std::collections::HashMap::with_capacity(1);
        single.insert(file.path.clone(), file.contents.clone());
        async move {
            let result = fast_code_fixer(provider, "realtime post-generation review", issues, &single).await;
            (file.path.clone(), result)
        }
    }))
    .await;

    let mut fixed_paths = Vec::new();
    for (path, result) in fixes {
        match result {
            Ok(fixed_files) => {
                for fixed in fixed_files {
                    if let Some(target) = implemented.iter_mut().find(|f| f.path == fixed.path) {
                        if target.contents != fixed.contents {
                            target.contents = fixed.contents;
                            fixed_paths.push(path.clone());
                        }
                    }
                }
            }
            Err(err) => {
                debug!(%path, %err, "realtime fixer skipped file after error");
            }
        }
    }
    fixed_paths
}
