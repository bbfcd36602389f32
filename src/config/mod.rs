// src/config/mod.rs
// Central configuration, composed by domain and assembled once via CONFIG.

pub mod github;
pub mod helpers;
pub mod inference;
pub mod registry;
pub mod sandbox;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: ForgeConfig = ForgeConfig::from_env();
}

/// Composes every domain config. Loaded once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub logging: server::LoggingConfig,
    pub sandbox: sandbox::SandboxConfig,
    pub inference: inference::InferenceConfig,
    pub registry: registry::RegistryConfig,
    pub github: github::GitHubConfig,
    pub repos_root: String,
    pub phases_counter_default: u32,
}

impl ForgeConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
            sandbox: sandbox::SandboxConfig::from_env(),
            inference: inference::InferenceConfig::from_env(),
            registry: registry::RegistryConfig::from_env(),
            github: github::GitHubConfig::from_env(),
            repos_root: helpers::env_or("FORGE_REPOS_ROOT", "./repos"),
            phases_counter_default: helpers::env_usize("FORGE_PHASES_COUNTER_DEFAULT", 8) as u32,
        }
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
