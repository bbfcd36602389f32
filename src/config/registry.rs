// src/config/registry.rs
// Configuration for the external application registry (spec 6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: super::helpers::env_or("REGISTRY_BASE_URL", "http://localhost:5000"),
            api_key: super::helpers::env_or("REGISTRY_API_KEY", ""),
        }
    }
}
