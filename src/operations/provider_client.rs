// src/operations/provider_client.rs
// Concrete `ModelProvider` backed by the configured inference endpoint
// (spec 1, 4.6: model internals are out of scope, only base_url/api_key/
// model matter here). Grounded on the reqwest-JSON-body idiom shared by
// `sandbox::SandboxClient` and `registry::RegistryClient`, talking an
// OpenAI-compatible chat-completions wire shape the way the teacher's
// `Gemini3Provider` talks Gemini's generateContent shape.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::inference::InferenceConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

use super::provider::{CompletionRequest, CompletionResponse, ModelProvider};

pub struct InferenceClient {
    http: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.config.api_key)
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ModelProvider for InferenceClient {
    async fn complete(&self, req: CompletionRequest) -> OrchestratorResult<CompletionResponse> {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        messages.push(ChatMessage { role: "system", content: &req.system });
        for (role, content) in &req.messages {
            messages.push(ChatMessage { role, content });
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            response_format: req.expects_json.then(|| json!({ "type": "json_object" })),
        };

        debug!(model = %self.config.model, expects_json = req.expects_json, "inference call");
        let resp = self
            .authed(self.http.post(format!("{}/chat/completions", self.config.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transient(format!("inference request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            crate::metrics::record_inference_call(&self.config.model, false);
            return Err(OrchestratorError::Transient(format!("inference error {status}: {text}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OrchestratorError::Transient(format!("malformed inference response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OrchestratorError::Transient("inference response had no choices".to_string()))?;
        let usage = parsed.usage.unwrap_or_default();

        crate::metrics::record_inference_call(&self.config.model, true);
        crate::metrics::record_tokens(usage.prompt_tokens as u64, usage.completion_tokens as u64);

        Ok(CompletionResponse {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}
