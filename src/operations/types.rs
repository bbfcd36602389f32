// src/operations/types.rs
// Request/response shapes for the eight Operations of spec 4.6.

use tokio_util::sync::CancellationToken;

use crate::store::schema::{FileConcept, GeneratedFile, Phase, ProjectState, TemplateDetails};

/// Shared read-only context passed into every Operation (spec 4.6:
/// "a context{state snapshot, templateDetails, cancellation}").
#[derive(Clone)]
pub struct OperationContext {
    pub state: ProjectState,
    pub template_details: Option<TemplateDetails>,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub suggestions: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PhaseConcept {
    pub phase: Phase,
    pub install_commands: Vec<String>,
    pub files_to_delete: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImplementedFile {
    pub path: String,
    pub contents: String,
    pub purpose: String,
}

#[derive(Debug, Clone)]
pub struct ImplementPhaseResult {
    pub files: Vec<ImplementedFile>,
    pub commands: Vec<String>,
    pub deployment_needed: bool,
    /// Paths the realtime fixer (spec 4.6, `agentMode == smart`) patched
    /// before this result was returned.
    pub realtime_fixed_paths: Vec<String>,
}

/// Streamed during `ImplementPhase` (spec 4.6: "Streams file-level and
/// chunk-level events through callbacks").
#[derive(Debug, Clone)]
pub enum ImplementPhaseEvent {
    FileGenerating { path: String },
    FileChunkGenerated { path: String, chunk: String },
    FileGenerated { path: String },
}

#[derive(Debug, Clone)]
pub struct DeterministicFixResult {
    pub modified_files: Vec<ImplementedFile>,
    pub unfixable_issues: Vec<String>,
    /// `bun install <pkg>` commands synthesized from `TS2307` diagnostics.
    pub install_commands: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UserConverseResult {
    pub user_response: String,
    pub new_conversation_state: serde_json::Value,
}

pub(super) fn file_concept_paths(files: &[FileConcept]) -> Vec<String> {
    files.iter().map(|f| f.path.clone()).collect()
}

pub(super) fn generated_file_snapshot(
    map: &std::collections::HashMap<String, GeneratedFile>,
) -> Vec<ImplementedFile> {
    map.values()
        .map(|f| ImplementedFile {
            path: f.path.clone(),
            contents: f.contents.clone(),
            purpose: f.purpose.clone(),
        })
        .collect()
}
