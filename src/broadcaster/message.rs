// src/broadcaster/message.rs
// The orchestrator's streaming protocol (spec 4.9): a typed, tagged-union
// message stream in both directions. Shaped the way the teacher's
// `api/ws/message.rs` shapes `WsClientMessage`/`WsServerMessage`, but the
// variant set is this orchestrator's own phase-lifecycle protocol, not the
// teacher's generic chat/IDE protocol.

use serde::{Deserialize, Serialize};

use crate::store::schema::{Blueprint, DevState, GeneratedFile, TemplateDetails};

/// agent -> client (spec 4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AgentConnected {
        state: DevState,
        template_details: Option<TemplateDetails>,
    },
    CfAgentState {
        state: serde_json::Value,
    },
    ConversationState {
        messages: Vec<serde_json::Value>,
    },
    ConversationResponse {
        response: String,
    },
    ConversationCleared,
    FileGenerating {
        path: String,
    },
    FileChunkGenerated {
        path: String,
        chunk: String,
    },
    FileGenerated {
        path: String,
    },
    FileRegenerating {
        path: String,
    },
    FileRegenerated {
        path: String,
    },
    GenerationStarted,
    GenerationComplete,
    GenerationStopped,
    GenerationResumed,
    PhaseGenerating,
    PhaseGenerated {
        phase_name: String,
    },
    PhaseImplementing {
        phase_name: String,
    },
    PhaseValidating {
        phase_name: String,
    },
    PhaseValidated {
        phase_name: String,
        issues: Vec<String>,
    },
    PhaseImplemented {
        phase_name: String,
        files: Vec<GeneratedFile>,
    },
    DeploymentStarted,
    DeploymentCompleted {
        preview_url: String,
    },
    DeploymentFailed {
        error: String,
    },
    CloudflareDeploymentStarted,
    CloudflareDeploymentCompleted {
        deployment_id: String,
    },
    CloudflareDeploymentError {
        error: String,
    },
    GithubExportStarted,
    GithubExportProgress {
        message: String,
    },
    GithubExportCompleted {
        commit_sha: String,
        repository_url: String,
    },
    GithubExportError {
        error: String,
    },
    RuntimeErrorFound {
        message: String,
    },
    CodeReviewing,
    CodeReviewed {
        issues: Vec<String>,
    },
    StaticAnalysisResults {
        success: bool,
        issue_count: usize,
    },
    DeterministicCodeFixStarted,
    DeterministicCodeFixCompleted {
        fixed_count: usize,
        unfixable_count: usize,
    },
    PreviewForceRefresh,
    RateLimitError {
        retry_after_secs: Option<u64>,
    },
    Error {
        code: String,
        message: String,
    },
    ModelConfigsInfo {
        models: Vec<String>,
    },
    TerminalOutput {
        command: String,
        stdout: String,
        stderr: String,
    },
    ServerLog {
        level: String,
        message: String,
    },
    ScreenshotCaptureStarted,
    ScreenshotCaptureSuccess {
        url: String,
    },
    ScreenshotCaptureError {
        error: String,
    },
    ProjectNameUpdated {
        project_name: String,
    },
    BlueprintUpdated {
        blueprint: Blueprint,
    },
    DeepDebugStarted {
        issue: String,
    },
    DeepDebugToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    DeepDebugChunk {
        text: String,
    },
    DeepDebugCompleted,
}

/// client -> agent (spec 4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Preview,
    GenerateAll {
        #[serde(default)]
        review_cycles: Option<u32>,
    },
    StopGeneration,
    ResumeGeneration,
    ClearConversation,
    UserSuggestion {
        text: String,
        #[serde(default)]
        images: Vec<String>,
    },
    GetModelConfigs,
    TerminalCommand {
        command: String,
    },
}
