// src/sandbox/types.rs
// Wire types for the external sandbox execution service (spec 4.5, 6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct SandboxFile {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DeployOptions {
    #[serde(default)]
    pub redeploy: bool,
    #[serde(default)]
    pub clear_logs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployResult {
    pub preview_url: String,
    #[serde(default)]
    pub tunnel_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetFilesResult {
    pub success: bool,
    #[serde(default)]
    pub files: Vec<SandboxFile>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCommandsResult {
    pub success: bool,
    pub results: Vec<CommandResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LintIssue {
    pub file: String,
    pub line: u32,
    pub message: String,
    #[serde(default)]
    pub rule: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypecheckIssue {
    pub file: String,
    pub line: u32,
    pub message: String,
    /// TypeScript diagnostic code, e.g. `"TS2307"` (spec 4.6 DeterministicFixer).
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LintReport {
    pub issues: Vec<LintIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypecheckReport {
    pub issues: Vec<TypecheckIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticAnalysisResult {
    pub lint: LintReport,
    pub typecheck: TypecheckReport,
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeError {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceStatus {
    pub is_healthy: bool,
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotResult {
    pub url: String,
}
