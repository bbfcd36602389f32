// src/sandbox/mod.rs
// SandboxClient (spec 4.5): typed RPC façade over the external sandbox
// execution service. Grounded on the teacher's reqwest-client idiom
// (`llm/provider/gemini_embeddings.rs`): a single `reqwest::Client`, JSON
// bodies, status-checked responses, `tracing` at each call boundary.

pub mod types;

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

pub use types::*;

use crate::config::sandbox::SandboxConfig;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
    #[error("preview expired: {0}")]
    PreviewExpired(String),
    #[error("sandbox request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sandbox returned an error: {0}")]
    Remote(String),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Typed façade over the sandbox service (spec 4.5).
pub struct SandboxClient {
    http: Client,
    config: SandboxConfig,
}

impl SandboxClient {
    pub fn new(config: SandboxConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_secs.max(30)))
            .build()
            .expect("failed to build sandbox HTTP client");
        Self { http, config }
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

    /// May allocate a fresh session on `redeploy=true`; the previous preview
    /// URL is invalidated by the caller (spec 5 shared resources).
    pub async fn deploy(
        &self,
        session_id: &str,
        files: &[SandboxFile],
        opts: &DeployOptions,
    ) -> SandboxResult<DeployResult> {
        debug!(session_id, file_count = files.len(), redeploy = opts.redeploy, "sandbox deploy");
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/deploy"))))
            .timeout(Duration::from_secs(self.config.deploy_timeout_secs))
            .json(&serde_json::json!({ "files": files, "options": opts }))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn get_files(
        &self,
        session_id: &str,
        paths: &[String],
    ) -> SandboxResult<GetFilesResult> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/files/get"))))
            .json(&serde_json::json!({ "paths": paths }))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn write_files(
        &self,
        session_id: &str,
        files: &[SandboxFile],
        message: &str,
    ) -> SandboxResult<()> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/files/write"))))
            .json(&serde_json::json!({ "files": files, "message": message }))
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    pub async fn execute_commands(
        &self,
        session_id: &str,
        commands: &[String],
        timeout_ms: Option<u64>,
    ) -> SandboxResult<ExecuteCommandsResult> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/exec"))))
            .timeout(Duration::from_millis(timeout_ms.unwrap_or(30_000)))
            .json(&serde_json::json!({ "commands": commands }))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn run_static_analysis(
        &self,
        session_id: &str,
        files: Option<&[String]>,
    ) -> SandboxResult<StaticAnalysisResult> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/analyze"))))
            .json(&serde_json::json!({ "files": files }))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    /// Draining semantics when `clear=true` (spec 4.5).
    pub async fn fetch_runtime_errors(
        &self,
        session_id: &str,
        clear: bool,
    ) -> SandboxResult<Vec<RuntimeError>> {
        let resp = self
            .authed(self.http.post(self.url(&format!(
                "/sessions/{session_id}/runtime-errors?clear={clear}"
            ))))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    /// Logs are cumulative unless `reset=true` (spec 4.5).
    pub async fn get_logs(
        &self,
        session_id: &str,
        reset: bool,
        duration_seconds: Option<u64>,
    ) -> SandboxResult<LogsResult> {
        let mut url = format!("/sessions/{session_id}/logs?reset={reset}");
        if let Some(d) = duration_seconds {
            url.push_str(&format!("&duration_seconds={d}"));
        }
        let resp = self.authed(self.http.get(self.url(&url))).send().await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn get_instance_status(&self, session_id: &str) -> SandboxResult<InstanceStatus> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/sessions/{session_id}/status"))))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn capture_screenshot(&self, session_id: &str) -> SandboxResult<ScreenshotResult> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/screenshot"))))
            .send()
            .await?;
        self.parse_or_unavailable(resp).await
    }

    pub async fn update_project_name(&self, session_id: &str, name: &str) -> SandboxResult<()> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/sessions/{session_id}/rename"))))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    async fn parse_or_unavailable<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> SandboxResult<T> {
        let status = resp.status();
        if status == reqwest::StatusCode::GONE {
            let text = resp.text().await.unwrap_or_default();
            return Err(SandboxError::PreviewExpired(text));
        }
        if status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, "sandbox unavailable");
            return Err(SandboxError::Unavailable(text));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SandboxError::Remote(format!("{status}: {text}")));
        }
        Ok(resp.json().await?)
    }

    async fn ensure_success(&self, resp: reqwest::Response) -> SandboxResult<()> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(SandboxError::Remote(format!("{status}: {text}")))
        }
    }
}
