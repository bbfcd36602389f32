// src/orchestrator/mod.rs
// Orchestrator (spec 4.7): composition root and external API surface. Owns
// every other component and exposes the project-lifecycle methods the
// MessageRouter (and, for non-WS callers, the HTTP layer) dispatch into.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::broadcaster::{Broadcaster, ServerMessage};
use crate::deployment::DeploymentManager;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::files::FileManager;
use crate::git::GitStore;
use crate::github::{GitHubPusher, PushMetadata, PushOptions, PushResult};
use crate::operations::types::OperationContext;
use crate::operations::user_converse::ToolSpec;
use crate::operations::{self, ModelProvider};
use crate::registry::{RegistryClient, UpdateAppRequest};
use crate::sandbox::SandboxClient;
use crate::state_machine::StateMachine;
use crate::store::schema::BLUEPRINT_PATCHABLE_KEYS;
use crate::store::Store;

lazy_static! {
    static ref PROJECT_NAME_PATTERN: Regex =
        Regex::new(r"^[a-z0-9_-]{3,50}$").expect("valid project name regex");
}

pub struct Orchestrator {
    pub store: Arc<Store>,
    pub git: Arc<GitStore>,
    pub files: Arc<FileManager>,
    pub sandbox: Arc<SandboxClient>,
    pub broadcaster: Arc<Broadcaster>,
    pub deployment: Arc<DeploymentManager>,
    pub registry: Arc<RegistryClient>,
    pub github: Arc<GitHubPusher>,
    pub state_machine: Arc<StateMachine>,
    provider: Arc<dyn ModelProvider>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        git: Arc<GitStore>,
        files: Arc<FileManager>,
        sandbox: Arc<SandboxClient>,
        broadcaster: Arc<Broadcaster>,
        deployment: Arc<DeploymentManager>,
        registry: Arc<RegistryClient>,
        github: Arc<GitHubPusher>,
        state_machine: Arc<StateMachine>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            store,
            git,
            files,
            sandbox,
            broadcaster,
            deployment,
            registry,
            github,
            state_machine,
            provider,
        }
    }

    pub async fn broadcast(&self, msg: ServerMessage) {
        self.broadcaster.broadcast(msg).await;
    }

    /// `generateAllFiles` (spec 4.7, 4.8).
    pub async fn generate_all_files(&self, review_cycles: u32) -> OrchestratorResult<()> {
        self.state_machine.run(review_cycles).await
    }

    /// `stopGeneration` (spec 4.7).
    pub async fn stop_generation(&self) {
        self.state_machine.stop();
        self.broadcaster.broadcast(ServerMessage::GenerationStopped).await;
    }

    /// `resumeGeneration` (spec 4.7).
    pub async fn resume_generation(&self) -> OrchestratorResult<()> {
        self.store.mutate(|s| s.should_be_generating = true).await?;
        if !self.state_machine.is_running() {
            self.broadcaster.broadcast(ServerMessage::GenerationResumed).await;
            self.generate_all_files(5).await?;
        }
        Ok(())
    }

    /// `queueUserRequest` (spec 4.7): recharges `phasesCounter` to at least 3.
    pub async fn queue_user_request(&self, text: String, images: Vec<String>) -> OrchestratorResult<()> {
        self.store
            .mutate(|s| {
                s.pending_user_inputs.push(text);
                s.images.extend(images);
                s.phases_counter_at_least(3);
            })
            .await?;
        if !self.state_machine.is_running() {
            self.generate_all_files(5).await?;
        }
        Ok(())
    }

    /// `handleUserInput` (spec 4.7): runs UserConverse; starts the state
    /// machine if idle.
    pub async fn handle_user_input(&self, text: String, images: Vec<String>) -> OrchestratorResult<()> {
        let state = self.store.get().await;
        let errors = self
            .sandbox
            .fetch_runtime_errors(state.sandbox_instance_id.as_deref().unwrap_or("pending"), true)
            .await
            .map(|errs| errs.into_iter().map(|e| e.message).collect::<Vec<_>>())
            .unwrap_or_default();

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let broadcaster = self.broadcaster.clone();
        let forward = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                broadcaster
                    .broadcast(ServerMessage::ConversationResponse { response: chunk })
                    .await;
            }
        });

        let result = operations::user_converse(
            self.provider.as_ref(),
            &text,
            &format!("{:?}", state.current_dev_state),
            &errors,
            &state.project_updates_accumulator,
            &images,
            tx,
            &self.converse_tools(),
        )
        .await;
        let _ = forward.await;
        let result = result?;

        self.store
            .mutate(|s| s.conversation_messages.push(result.new_conversation_state.clone()))
            .await?;

        if !self.state_machine.is_running() {
            self.generate_all_files(5).await?;
        }
        Ok(())
    }

    /// `clearConversation` (spec 4.7, 4.2): empties `conversationMessages`,
    /// not the persisted full history.
    pub async fn clear_conversation(&self) -> OrchestratorResult<()> {
        self.store.mutate(|s| s.conversation_messages.clear()).await?;
        self.broadcaster.broadcast(ServerMessage::ConversationCleared).await;
        Ok(())
    }

    /// `updateProjectName` (spec 4.7): validates `^[a-z0-9_-]{3,50}$`.
    /// Returns `false` without mutating state on an invalid name (spec 9
    /// example: `"My App"` rejected).
    pub async fn update_project_name(&self, name: &str) -> OrchestratorResult<bool> {
        if !PROJECT_NAME_PATTERN.is_match(name) {
            return Ok(false);
        }

        let session_id = self.store.get().await.sandbox_instance_id;
        self.store
            .mutate(|s| {
                s.project_name = name.to_string();
                s.blueprint.project_name = name.to_string();
            })
            .await?;

        if let Some(session_id) = session_id {
            if let Err(err) = self.sandbox.update_project_name(&session_id, name).await {
                warn!(%err, "sandbox rename failed");
            }
        }
        if let Err(err) = self
            .registry
            .update_app(
                &self.store.get().await.id,
                &UpdateAppRequest {
                    title: Some(name.to_string()),
                    ..Default::default()
                },
            )
            .await
        {
            warn!(%err, "registry rename failed");
        }

        self.broadcaster
            .broadcast(ServerMessage::ProjectNameUpdated { project_name: name.to_string() })
            .await;
        Ok(true)
    }

    /// `updateBlueprint` (spec 4.7): whitelisted-keys deep merge; delegates
    /// `projectName` to `update_project_name`.
    pub async fn update_blueprint(&self, patch: serde_json::Map<String, serde_json::Value>) -> OrchestratorResult<()> {
        let mut patch = patch;
        if let Some(name) = patch.remove("projectName").and_then(|v| v.as_str().map(str::to_string)) {
            self.update_project_name(&name).await?;
        }

        self.store
            .mutate(|s| {
                let mut blueprint_json = serde_json::to_value(&s.blueprint).unwrap_or_default();
                if let Some(obj) = blueprint_json.as_object_mut() {
                    for key in BLUEPRINT_PATCHABLE_KEYS {
                        if let Some(value) = patch.get(*key) {
                            obj.insert(key.to_string(), value.clone());
                        }
                    }
                }
                if let Ok(updated) = serde_json::from_value(blueprint_json) {
                    s.blueprint = updated;
                }
            })
            .await?;

        let blueprint = self.store.get().await.blueprint;
        self.broadcaster
            .broadcast(ServerMessage::BlueprintUpdated { blueprint })
            .await;
        Ok(())
    }

    /// `deployToSandbox` (spec 4.7).
    pub async fn deploy_to_sandbox(
        &self,
        redeploy: bool,
        commit_message: Option<String>,
        clear_logs: bool,
    ) -> OrchestratorResult<()> {
        self.broadcaster.broadcast(ServerMessage::DeploymentStarted).await;
        let all_files = self.files.get_all_files().await;
        let files = all_files
            .into_iter()
            .map(|(path, contents)| crate::sandbox::SandboxFile { path, contents })
            .collect();

        match self
            .deployment
            .deploy_to_sandbox(files, redeploy, commit_message, clear_logs)
            .await
        {
            Ok(result) => {
                self.broadcaster
                    .broadcast(ServerMessage::DeploymentCompleted { preview_url: result.preview_url })
                    .await;
                Ok(())
            }
            Err(err) => {
                self.broadcaster
                    .broadcast(ServerMessage::DeploymentFailed { error: err.to_string() })
                    .await;
                Err(err)
            }
        }
    }

    /// `deployToCloudflare` (spec 4.7).
    pub async fn deploy_to_cloudflare(&self) -> OrchestratorResult<()> {
        self.broadcaster.broadcast(ServerMessage::CloudflareDeploymentStarted).await;
        match self.deployment.deploy_to_cloudflare().await {
            Ok(_) => {
                let deployment_id = uuid::Uuid::new_v4().to_string();
                let app_id = self.store.get().await.id;
                let _ = self
                    .registry
                    .update_app(
                        &app_id,
                        &UpdateAppRequest {
                            deployment_id: Some(deployment_id.clone()),
                            ..Default::default()
                        },
                    )
                    .await;
                self.broadcaster
                    .broadcast(ServerMessage::CloudflareDeploymentCompleted { deployment_id })
                    .await;
                Ok(())
            }
            Err(err) => {
                self.broadcaster
                    .broadcast(ServerMessage::CloudflareDeploymentError { error: err.to_string() })
                    .await;
                Err(err)
            }
        }
    }

    /// `pushToGitHub` (spec 4.7, 6).
    pub async fn push_to_github(&self, options: PushOptions) -> OrchestratorResult<PushResult> {
        self.broadcaster.broadcast(ServerMessage::GithubExportStarted).await;
        let objects = self.git.export_objects().await?;
        let state = self.store.get().await;
        let metadata = PushMetadata {
            app_created_at: state.created_at,
            query: state.query.clone(),
        };
        match self.github.push(objects, metadata, options).await {
            Ok(result) => {
                if let Err(err) = self
                    .registry
                    .update_app(
                        &state.id,
                        &UpdateAppRequest {
                            github_repository_url: Some(result.repository_url.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    warn!(%err, "registry update after github push failed");
                }
                self.broadcaster
                    .broadcast(ServerMessage::GithubExportCompleted {
                        commit_sha: result.commit_sha.clone(),
                        repository_url: result.repository_url.clone(),
                    })
                    .await;
                Ok(result)
            }
            Err(err) => {
                self.broadcaster
                    .broadcast(ServerMessage::GithubExportError { error: err.to_string() })
                    .await;
                Err(err.into())
            }
        }
    }

    /// `readFiles` (spec 4.7).
    pub async fn read_files(&self, paths: &[String]) -> OrchestratorResult<std::collections::HashMap<String, String>> {
        let all = self.files.get_all_files().await;
        Ok(all
            .into_iter()
            .filter(|(path, _)| paths.contains(path))
            .collect())
    }

    /// `execCommands` (spec 4.7, 4.8 sub-algorithm).
    pub async fn exec_commands(
        &self,
        commands: Vec<String>,
        _should_save: bool,
        _timeout_ms: Option<u64>,
    ) -> OrchestratorResult<crate::state_machine::CommandOutcome> {
        let session_id = self
            .store
            .get()
            .await
            .sandbox_instance_id
            .ok_or_else(|| OrchestratorError::not_found("no sandbox session for this project"))?;
        let outcome = crate::state_machine::execute_commands(
            &self.sandbox,
            &self.store,
            &self.files,
            self.provider.as_ref(),
            &session_id,
            commands,
        )
        .await?;
        for command in &outcome.succeeded {
            self.broadcaster
                .broadcast(ServerMessage::TerminalOutput {
                    command: command.clone(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
                .await;
        }
        Ok(outcome)
    }

    /// `runStaticAnalysisCode` (spec 4.7).
    pub async fn run_static_analysis_code(&self) -> OrchestratorResult<crate::sandbox::StaticAnalysisResult> {
        self.broadcaster.broadcast(ServerMessage::CodeReviewing).await;
        let session_id = self.store.get().await.sandbox_instance_id.unwrap_or_default();
        let result = self.sandbox.run_static_analysis(&session_id, None).await?;
        let issue_count = result.lint.issues.len() + result.typecheck.issues.len();
        self.broadcaster
            .broadcast(ServerMessage::StaticAnalysisResults { success: result.success, issue_count })
            .await;
        Ok(result)
    }

    /// `fetchRuntimeErrors` (spec 4.7, 4.5).
    pub async fn fetch_runtime_errors(&self, clear: bool) -> OrchestratorResult<Vec<crate::sandbox::RuntimeError>> {
        let session_id = self.store.get().await.sandbox_instance_id.unwrap_or_default();
        let errors = self.sandbox.fetch_runtime_errors(&session_id, clear).await?;
        for err in &errors {
            self.broadcaster
                .broadcast(ServerMessage::RuntimeErrorFound { message: err.message.clone() })
                .await;
        }
        Ok(errors)
    }

    /// `regenerateFileByPath` (spec 4.7).
    pub async fn regenerate_file_by_path(&self, path: &str, issues: &[String]) -> OrchestratorResult<()> {
        let current = self
            .files
            .get_all_files()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| OrchestratorError::not_found(format!("no such file: {path}")))?;

        self.broadcaster
            .broadcast(ServerMessage::FileRegenerating { path: path.to_string() })
            .await;

        let file = crate::operations::types::ImplementedFile {
            path: path.to_string(),
            contents: current,
            purpose: String::new(),
        };
        let regenerated = operations::regenerate_file(self.provider.as_ref(), &file, issues).await?;
        self.files
            .save_generated_files(
                vec![(regenerated.path.clone(), regenerated.contents, regenerated.purpose)],
                None,
            )
            .await?;

        self.broadcaster
            .broadcast(ServerMessage::FileRegenerated { path: path.to_string() })
            .await;
        Ok(())
    }

    /// Tools advertised to `UserConverse` (spec 4.6, 4.8's shared tool
    /// surface). `deep_debug` is described here but invoked through
    /// `Self::deep_debug`, not dispatched inline by the conversational reply.
    fn converse_tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "deep_debug".to_string(),
            description: "Start a long-running investigation into a runtime issue, with access \
                to sandbox tool calls. Not composable with file generation."
                .to_string(),
        }]
    }

    /// `deepDebug` (spec 4.6, 4.8): guarded single-flight via
    /// `StateMachine::run_deep_debug`; persists the transcript for
    /// resumption on a later call.
    pub async fn deep_debug(&self, issue: &str, focus_paths: &[String]) -> OrchestratorResult<String> {
        self.state_machine.run_deep_debug(issue, focus_paths).await
    }

    /// `captureScreenshot` (spec 4.7, 4.5).
    pub async fn capture_screenshot(&self) -> OrchestratorResult<String> {
        self.broadcaster.broadcast(ServerMessage::ScreenshotCaptureStarted).await;
        let session_id = self
            .store
            .get()
            .await
            .sandbox_instance_id
            .ok_or_else(|| OrchestratorError::not_found("no sandbox session for this project"))?;

        match self.sandbox.capture_screenshot(&session_id).await {
            Ok(result) => {
                let app_id = self.store.get().await.id;
                if let Err(err) = self
                    .registry
                    .update_app(
                        &app_id,
                        &UpdateAppRequest {
                            screenshot_url: Some(result.url.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    warn!(%err, "registry screenshot update failed");
                }
                self.broadcaster
                    .broadcast(ServerMessage::ScreenshotCaptureSuccess { url: result.url.clone() })
                    .await;
                Ok(result.url)
            }
            Err(err) => {
                self.broadcaster
                    .broadcast(ServerMessage::ScreenshotCaptureError { error: err.to_string() })
                    .await;
                Err(err.into())
            }
        }
    }

    /// `getLogs` (spec 4.7, 4.5).
    pub async fn get_logs(&self, reset: bool, duration_secs: Option<u64>) -> OrchestratorResult<crate::sandbox::LogsResult> {
        let session_id = self.store.get().await.sandbox_instance_id.unwrap_or_default();
        Ok(self.sandbox.get_logs(&session_id, reset, duration_secs).await?)
    }

    pub async fn broadcast_preview(&self) {
        self.broadcaster.broadcast(ServerMessage::PreviewForceRefresh).await;
    }

    pub async fn broadcast_model_configs(&self) {
        self.broadcaster
            .broadcast(ServerMessage::ModelConfigsInfo {
                models: vec![crate::config::CONFIG.inference.model.clone()],
            })
            .await;
    }

    /// Operations invoked by tests and by the initial WS handshake (spec 4.9).
    pub async fn send_agent_connected(&self, connection: &crate::broadcaster::Connection) {
        let state = self.store.get().await;
        let _ = connection
            .send(&ServerMessage::AgentConnected {
                state: state.current_dev_state,
                template_details: state.template_details,
            })
            .await;
    }

    pub fn operation_context(&self, state: crate::store::schema::ProjectState) -> OperationContext {
        OperationContext {
            template_details: state.template_details.clone(),
            state,
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }
}
