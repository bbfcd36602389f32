// src/config/sandbox.rs
// Configuration for the external sandbox execution service (spec 4.5, 6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub base_url: String,
    pub api_key: String,
    pub deploy_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: super::helpers::env_or("SANDBOX_BASE_URL", "http://localhost:8787"),
            api_key: super::helpers::env_or("SANDBOX_API_KEY", ""),
            deploy_timeout_secs: super::helpers::env_usize("SANDBOX_DEPLOY_TIMEOUT_SECS", 60) as u64,
            command_timeout_secs: super::helpers::env_usize("SANDBOX_COMMAND_TIMEOUT_SECS", 30) as u64,
        }
    }
}
