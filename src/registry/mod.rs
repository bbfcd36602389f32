// src/registry/mod.rs
// Application-metadata registry client (spec 4.7, 6): a small reqwest
// façade grounded on the same style as `sandbox::SandboxClient` /
// `llm::provider::gemini_embeddings`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::registry::RegistryConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Serialize)]
pub struct CreateAppRequest {
    pub project_id: String,
    pub user_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAppRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_repository_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppDetails {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub github_repository_url: Option<String>,
    #[serde(default)]
    pub deployment_id: Option<String>,
}

pub struct RegistryClient {
    http: Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.config.api_key)
        }
    }

    pub async fn create_app(&self, req: &CreateAppRequest) -> OrchestratorResult<AppDetails> {
        debug!(project_id = %req.project_id, "registry createApp");
        let resp = self
            .authed(self.http.post(self.url("/apps")))
            .json(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transient(format!("registry createApp: {e}")))?;
        parse(resp).await
    }

    pub async fn update_app(&self, app_id: &str, req: &UpdateAppRequest) -> OrchestratorResult<AppDetails> {
        debug!(app_id, "registry updateApp");
        let resp = self
            .authed(self.http.patch(self.url(&format!("/apps/{app_id}"))))
            .json(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transient(format!("registry updateApp: {e}")))?;
        parse(resp).await
    }

    pub async fn get_app_details(&self, app_id: &str) -> OrchestratorResult<AppDetails> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/apps/{app_id}"))))
            .send()
            .await
            .map_err(|e| OrchestratorError::Transient(format!("registry getAppDetails: {e}")))?;
        parse(resp).await
    }
}

async fn parse(resp: reqwest::Response) -> OrchestratorResult<AppDetails> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(OrchestratorError::Transient(format!("registry error {status}: {text}")));
    }
    resp.json()
        .await
        .map_err(|e| OrchestratorError::Transient(format!("malformed registry response: {e}")))
}
