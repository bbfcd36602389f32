// src/error.rs
// Top-level error type composing the typed error kinds from the component
// layers (git, sandbox, operations, state machine) plus the cross-cutting
// kinds the orchestrator surfaces to clients (spec 7).

use thiserror::Error;

use crate::git::error::GitError;
use crate::sandbox::SandboxError;

/// Top-level orchestrator error.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("preview expired: {0}")]
    PreviewExpired(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("loop detected: {0}")]
    LoopDetected(String),

    #[error("call limit exceeded: {0}")]
    CallLimitExceeded(String),

    #[error("generation already in progress")]
    GenerationInProgress,

    #[error("deep-debug session already in progress")]
    DebugInProgress,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal internal error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Stable machine-readable tag, mirrored into broadcast `error{code}` payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            Self::SandboxUnavailable(_) => "SANDBOX_UNAVAILABLE",
            Self::PreviewExpired(_) => "PREVIEW_EXPIRED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::LoopDetected(_) => "LOOP_DETECTED",
            Self::CallLimitExceeded(_) => "CALL_LIMIT_EXCEEDED",
            Self::GenerationInProgress => "GENERATION_IN_PROGRESS",
            Self::DebugInProgress => "DEBUG_IN_PROGRESS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Transient(_) => "TRANSIENT",
            Self::Fatal(_) => "FATAL",
            Self::Git(_) => "GIT_ERROR",
            Self::Sandbox(_) => "SANDBOX_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlx(_) => "STORE_ERROR",
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Extension trait mirroring the teacher's `IntoGitErrorResult` pattern for
/// converting any displayable error into a `Transient` orchestrator error
/// with added context.
pub trait IntoOrchestratorErrorResult<T> {
    fn context_err(self, context: &str) -> OrchestratorResult<T>;
}

impl<T, E: std::fmt::Display> IntoOrchestratorErrorResult<T> for Result<T, E> {
    fn context_err(self, context: &str) -> OrchestratorResult<T> {
        self.map_err(|e| OrchestratorError::Transient(format!("{context}: {e}")))
    }
}
