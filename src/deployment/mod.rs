// src/deployment/mod.rs
// DeploymentManager (spec Component table): owns the sandbox session
// lifecycle and the preview-URL cache, invalidating the cache on redeploy
// (spec 3 Lifecycles: "preview URL cache is invalidated on redeploy").

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::OrchestratorResult;
use crate::sandbox::{DeployOptions, DeployResult, SandboxClient, SandboxFile};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
struct PreviewCache {
    preview_url: Option<String>,
    tunnel_url: Option<String>,
}

pub struct DeploymentManager {
    store: Arc<Store>,
    sandbox: Arc<SandboxClient>,
    preview: RwLock<PreviewCache>,
}

impl DeploymentManager {
    pub fn new(store: Arc<Store>, sandbox: Arc<SandboxClient>) -> Self {
        Self {
            store,
            sandbox,
            preview: RwLock::new(PreviewCache::default()),
        }
    }

    /// `deployToSandbox` (spec 4.7). Ensures a sandbox session id exists,
    /// deploys, and refreshes the preview cache. Passing `redeploy=true`
    /// invalidates any cached preview URL before asking the sandbox for a
    /// fresh one.
    pub async fn deploy_to_sandbox(
        &self,
        files: Vec<SandboxFile>,
        redeploy: bool,
        commit_message: Option<String>,
        clear_logs: bool,
    ) -> OrchestratorResult<DeployResult> {
        if redeploy {
            let mut cache = self.preview.write().await;
            *cache = PreviewCache::default();
        }

        let session_id = self.ensure_session_id().await?;
        info!(session_id = %session_id, redeploy, "deploying to sandbox");

        let opts = DeployOptions {
            redeploy,
            clear_logs,
            commit_message,
        };
        let result = self.sandbox.deploy(&session_id, &files, &opts).await?;

        let mut cache = self.preview.write().await;
        cache.preview_url = Some(result.preview_url.clone());
        cache.tunnel_url = result.tunnel_url.clone();

        Ok(result)
    }

    /// `deployToCloudflare` (spec 4.7): ensures a sandbox session exists and
    /// triggers the cloud deploy path (here modeled as a redeploy with the
    /// sandbox's own cloud-publish semantics — the sandbox service, not this
    /// orchestrator, owns the Cloudflare-specific mechanics).
    pub async fn deploy_to_cloudflare(&self) -> OrchestratorResult<DeployResult> {
        let session_id = self.ensure_session_id().await?;
        info!(session_id = %session_id, "deploying to cloudflare");
        let files = {
            let state = self.store.get().await;
            state
                .generated_files_map
                .values()
                .map(|f| SandboxFile {
                    path: f.path.clone(),
                    contents: f.contents.clone(),
                })
                .collect::<Vec<_>>()
        };
        self.sandbox
            .deploy(
                &session_id,
                &files,
                &DeployOptions {
                    redeploy: true,
                    clear_logs: false,
                    commit_message: Some("Cloudflare deployment".to_string()),
                },
            )
            .await
            .map_err(Into::into)
    }

    pub async fn cached_preview_url(&self) -> Option<String> {
        self.preview.read().await.preview_url.clone()
    }

    async fn ensure_session_id(&self) -> OrchestratorResult<String> {
        let existing = self.store.get().await.sandbox_instance_id;
        if let Some(id) = existing {
            return Ok(id);
        }
        let new_id = uuid::Uuid::new_v4().to_string();
        warn!(session_id = %new_id, "allocating new sandbox session id");
        self.store
            .mutate(|state| state.sandbox_instance_id = Some(new_id.clone()))
            .await?;
        Ok(new_id)
    }
}
