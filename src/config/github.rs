// src/config/github.rs
// Configuration for the GitHub push collaborator (spec 4.7 pushToGitHub, 6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub template_base_repo: String,
    /// TTL, in seconds, for the in-memory cache of caller-supplied push tokens.
    /// Tokens are never persisted (spec 6).
    pub token_cache_ttl_secs: u64,
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        Self {
            template_base_repo: super::helpers::env_or(
                "GITHUB_TEMPLATE_BASE_REPO",
                "https://github.com/forge-templates/react-vite-cf",
            ),
            token_cache_ttl_secs: super::helpers::env_usize("GITHUB_TOKEN_CACHE_TTL_SECS", 3600) as u64,
        }
    }
}
