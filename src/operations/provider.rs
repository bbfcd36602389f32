// src/operations/provider.rs
// Black-box model-inference seam (spec 4.6): every Operation accepts a
// `&dyn ModelProvider` instead of depending on a concrete LLM client,
// mirroring the teacher's `llm::provider::Gemini3Provider` trait boundary
// (`llm/provider/mod.rs`) generalized to the single call shape the
// orchestrator's operations actually need.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrchestratorResult;

/// One inference call: a system instruction, the running conversation, and
/// an optional JSON schema the caller expects the reply to validate
/// against. Providers that support function/tool calling may ignore
/// `expects_json` and still return a JSON string if the underlying API
/// validates schemas natively.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<(String, String)>, // (role, content)
    pub expects_json: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Implemented by the orchestrator's concrete LLM client(s). Kept narrow on
/// purpose: Operations never see provider selection, retries, or pricing —
/// that lives behind the implementation, the way `Gemini3Provider` hides
/// request construction behind `generate`/`generate_with_tools` in the
/// teacher.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> OrchestratorResult<CompletionResponse>;
}

/// Parses a provider reply as JSON, tolerating a markdown code fence around
/// it (a common model habit the teacher's `gemini3.rs` response parser also
/// strips).
pub fn parse_json_reply(text: &str) -> OrchestratorResult<Value> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let stripped = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    serde_json::from_str(stripped)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("invalid model JSON reply: {e}")))
}
