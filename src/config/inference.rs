// src/config/inference.rs
// Configuration for the external model-inference provider (out of scope for
// its internals, spec 1; the orchestrator only needs endpoint + call budget).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub deep_debug_model: String,
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: super::helpers::env_or("INFERENCE_BASE_URL", "http://localhost:4000"),
            api_key: super::helpers::env_or("INFERENCE_API_KEY", ""),
            model: super::helpers::env_or("INFERENCE_MODEL", "default-coder"),
            deep_debug_model: super::helpers::env_or("INFERENCE_DEEP_DEBUG_MODEL", "default-coder"),
        }
    }
}
