// src/state_machine/mod.rs
// StateMachine (spec 4.8): drives one project's phase lifecycle. Single-
// flight per project (spec 5); cancellation-aware; resumable from whatever
// `currentDevState` was persisted.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcaster::{Broadcaster, ServerMessage};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::files::FileManager;
use crate::git::GitStore;
use crate::operations::types::{OperationContext, UserContext};
use crate::operations::{self, ModelProvider};
use crate::sandbox::SandboxClient;
use crate::store::schema::DevState;
use crate::store::Store;

mod commands;

pub use commands::{execute_commands, CommandOutcome};

/// Guards against concurrent `generateAllFiles` runs and deep-debug
/// sessions (spec 5: "At most one phase is in flight per project at any
/// moment"; "Deep debug sub-state: concurrent with IDLE; not composable
/// with generation").
pub struct RunGuard {
    generation: AsyncMutex<()>,
    debug: AsyncMutex<()>,
    cancellation: std::sync::Mutex<Option<CancellationToken>>,
}

impl Default for RunGuard {
    fn default() -> Self {
        Self {
            generation: AsyncMutex::new(()),
            debug: AsyncMutex::new(()),
            cancellation: std::sync::Mutex::new(None),
        }
    }
}

pub struct StateMachine {
    store: Arc<Store>,
    git: Arc<GitStore>,
    files: Arc<FileManager>,
    sandbox: Arc<SandboxClient>,
    broadcaster: Arc<Broadcaster>,
    provider: Arc<dyn ModelProvider>,
    guard: RunGuard,
}

impl StateMachine {
    pub fn new(
        store: Arc<Store>,
        git: Arc<GitStore>,
        files: Arc<FileManager>,
        sandbox: Arc<SandboxClient>,
        broadcaster: Arc<Broadcaster>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            store,
            git,
            files,
            sandbox,
            broadcaster,
            provider,
            guard: RunGuard::default(),
        }
    }

    /// `stopGeneration` (spec 4.7): cancels the in-flight run, if any.
    pub fn stop(&self) {
        if let Some(token) = self.guard.cancellation.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.generation.try_lock().is_err()
    }

    pub fn is_debugging(&self) -> bool {
        self.guard.debug.try_lock().is_err()
    }

    /// `generateAllFiles(reviewCycles=5)` (spec 4.7, 4.8): single-flight;
    /// no-op if `mvpGenerated ∧ pendingUserInputs == []`.
    pub async fn run(&self, review_cycles: u32) -> OrchestratorResult<()> {
        let _permit = self
            .guard
            .generation
            .try_lock()
            .map_err(|_| OrchestratorError::GenerationInProgress)?;

        let snapshot = self.store.get().await;
        if snapshot.mvp_generated && snapshot.pending_user_inputs.is_empty() {
            return Ok(());
        }

        let token = CancellationToken::new();
        *self.guard.cancellation.lock().unwrap() = Some(token.clone());

        self.broadcaster.broadcast(ServerMessage::GenerationStarted).await;
        let timer = crate::metrics::GenerationTimer::new();
        let result = self.run_inner(review_cycles, token).await;
        *self.guard.cancellation.lock().unwrap() = None;

        match &result {
            Ok(()) => {
                self.store
                    .mutate(|s| {
                        s.current_dev_state = DevState::Idle;
                        s.should_be_generating = false;
                        s.consecutive_rate_limits = 0;
                    })
                    .await?;
                self.broadcaster.broadcast(ServerMessage::GenerationComplete).await;
                timer.finish("complete");
            }
            Err(OrchestratorError::RateLimitExceeded(_)) => {
                let consecutive = {
                    let mut count = 0;
                    self.store
                        .mutate(|s| {
                            s.consecutive_rate_limits += 1;
                            count = s.consecutive_rate_limits;
                        })
                        .await?;
                    count
                };
                self.broadcaster
                    .broadcast(ServerMessage::RateLimitError {
                        retry_after_secs: Some(backoff_secs(consecutive)),
                    })
                    .await;
                timer.finish("rate_limited");
            }
            Err(err) => {
                self.store.mutate(|s| s.current_dev_state = DevState::Idle).await?;
                self.broadcaster
                    .broadcast(ServerMessage::Error {
                        code: err.tag().to_string(),
                        message: err.to_string(),
                    })
                    .await;
                timer.finish("error");
            }
        }

        result
    }

    async fn run_inner(&self, review_cycles: u32, token: CancellationToken) -> OrchestratorResult<()> {
        let entry_state = self.resume_entry_state().await?;
        let mut dev_state = entry_state;
        let mut cycles_left = review_cycles;

        loop {
            if token.is_cancelled() {
                self.broadcaster.broadcast(ServerMessage::GenerationStopped).await;
                return Ok(());
            }

            dev_state = match dev_state {
                DevState::PhaseGenerating => self.run_phase_generating().await?,
                DevState::PhaseImplementing => self.run_phase_implementing(&token).await?,
                DevState::Reviewing => self.run_reviewing(&mut cycles_left).await?,
                DevState::Finalizing => self.run_finalizing().await?,
                DevState::Idle => break,
            };
            self.store.mutate(|s| s.current_dev_state = dev_state).await?;
            self.broadcaster
                .broadcast(ServerMessage::CfAgentState {
                    state: serde_json::json!({ "currentDevState": dev_state }),
                })
                .await;

            if dev_state == DevState::Idle {
                break;
            }
        }

        Ok(())
    }

    /// Entry resume logic (spec 4.8 "On entry to generateAllFiles").
    async fn resume_entry_state(&self) -> OrchestratorResult<DevState> {
        let has_incomplete = self.store.get().await.last_incomplete_phase().is_some();
        if has_incomplete {
            return Ok(DevState::PhaseImplementing);
        }
        let has_any_phase = !self.store.get().await.generated_phases.is_empty();
        if has_any_phase {
            return Ok(DevState::PhaseGenerating);
        }
        let initial_phase = self.store.get().await.blueprint.initial_phase.clone();
        self.store
            .mutate(|s| {
                let mut phase = initial_phase;
                phase.completed = false;
                s.generated_phases.push(phase);
            })
            .await?;
        Ok(DevState::PhaseImplementing)
    }

    async fn run_phase_generating(&self) -> OrchestratorResult<DevState> {
        self.broadcaster.broadcast(ServerMessage::PhaseGenerating).await;
        let state = self.store.get().await;
        let ctx = OperationContext {
            state: state.clone(),
            template_details: state.template_details.clone(),
            cancellation: CancellationToken::new(),
        };
        let issues = state
            .inference_context
            .suggestions
            .clone();
        let user_context = UserContext {
            suggestions: state.pending_user_inputs.clone(),
            images: Vec::new(),
        };
        let next = operations::plan_next_phase(
            self.provider.as_ref(),
            &ctx,
            &issues,
            &user_context,
            !state.pending_user_inputs.is_empty(),
        )
        .await?;

        match next {
            Some(concept) => {
                self.broadcaster
                    .broadcast(ServerMessage::PhaseGenerated { phase_name: concept.phase.name.clone() })
                    .await;
                self.files.delete_files(&concept.files_to_delete).await?;
                self.store
                    .mutate(|s| {
                        s.generated_phases.push(concept.phase);
                        if !concept.install_commands.is_empty() {
                            s.pending_user_inputs.extend(concept.install_commands);
                        }
                    })
                    .await?;
                Ok(DevState::PhaseImplementing)
            }
            None => Ok(DevState::Finalizing),
        }
    }

    async fn run_phase_implementing(&self, token: &CancellationToken) -> OrchestratorResult<DevState> {
        let state = self.store.get().await;
        let phase = state
            .last_incomplete_phase()
            .cloned()
            .ok_or_else(|| OrchestratorError::fatal("PHASE_IMPLEMENTING with no incomplete phase"))?;

        self.broadcaster
            .broadcast(ServerMessage::PhaseImplementing { phase_name: phase.name.clone() })
            .await;

        let ctx = OperationContext {
            state: state.clone(),
            template_details: state.template_details.clone(),
            cancellation: token.clone(),
        };
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let broadcaster = self.broadcaster.clone();
        let forward = tokio::spawn(async move {
            use crate::operations::types::ImplementPhaseEvent;
            while let Some(event) = rx.recv().await {
                let msg = match event {
                    ImplementPhaseEvent::FileGenerating { path } => ServerMessage::FileGenerating { path },
                    ImplementPhaseEvent::FileChunkGenerated { path, chunk } => {
                        ServerMessage::FileChunkGenerated { path, chunk }
                    }
                    ImplementPhaseEvent::FileGenerated { path } => ServerMessage::FileGenerated { path },
                };
                broadcaster.broadcast(msg).await;
            }
        });

        let is_first_phase = state.generated_phases.len() == 1;
        let user_context = UserContext {
            suggestions: state.pending_user_inputs.clone(),
            images: Vec::new(),
        };
        let result = operations::implement_phase(
            self.provider.as_ref(),
            &ctx,
            &phase.files,
            &[],
            is_first_phase,
            &user_context,
            tx,
        )
        .await;
        let _ = forward.await;
        let result = result?;
        if !result.realtime_fixed_paths.is_empty() {
            info!(fixed = ?result.realtime_fixed_paths, "realtime fixer patched files before save");
        }

        if !result.files.is_empty() {
            let to_save = result
                .files
                .iter()
                .map(|f| (f.path.clone(), f.contents.clone(), f.purpose.clone()))
                .collect();
            self.files
                .save_generated_files(to_save, Some(&phase.name))
                .await?;

            let deploy_files = result
                .files
                .iter()
                .map(|f| crate::sandbox::SandboxFile {
                    path: f.path.clone(),
                    contents: f.contents.clone(),
                })
                .collect::<Vec<_>>();
            if let Err(err) = self
                .sandbox
                .deploy(
                    state.sandbox_instance_id.as_deref().unwrap_or("pending"),
                    &deploy_files,
                    &crate::sandbox::DeployOptions {
                        redeploy: false,
                        clear_logs: false,
                        commit_message: Some(phase.name.clone()),
                    },
                )
                .await
            {
                warn!(%err, "post-phase deploy failed");
            }

            if let Ok(analysis) = self.sandbox.run_static_analysis(
                state.sandbox_instance_id.as_deref().unwrap_or("pending"),
                None,
            )
            .await
            {
                let all_files = self.files.get_all_files().await;
                let fix = operations::deterministic_fixer(&all_files, &analysis.typecheck.issues);
                if !fix.install_commands.is_empty() {
                    self.store
                        .mutate(|s| s.pending_user_inputs.extend(fix.install_commands.clone()))
                        .await?;
                }

                if state.agent_mode == crate::store::schema::AgentMode::Smart && !fix.unfixable_issues.is_empty() {
                    match operations::fast_code_fixer(
                        self.provider.as_ref(),
                        "post-phase static analysis cleanup",
                        &fix.unfixable_issues,
                        &all_files,
                    )
                    .await
                    {
                        Ok(patched) if !patched.is_empty() => {
                            let to_save = patched
                                .iter()
                                .map(|f| (f.path.clone(), f.contents.clone(), f.purpose.clone()))
                                .collect();
                            self.files.save_generated_files(to_save, Some("post-phase fix")).await?;
                        }
                        Ok(_) => {}
                        Err(err) => warn!(%err, "fast code fixer failed"),
                    }
                }
            }
        }

        self.store
            .mutate(|s| {
                s.phases_counter -= 1;
                if let Some(p) = s.last_incomplete_phase_mut() {
                    p.completed = true;
                }
            })
            .await?;
        self.broadcaster
            .broadcast(ServerMessage::PhaseImplemented {
                phase_name: phase.name.clone(),
                files: result.files.iter().map(|f| crate::store::schema::GeneratedFile {
                    path: f.path.clone(),
                    contents: f.contents.clone(),
                    purpose: f.purpose.clone(),
                    last_diff: String::new(),
                    last_modified: chrono::Utc::now(),
                }).collect(),
            })
            .await;

        let state = self.store.get().await;
        if (phase.last_phase || state.phases_counter <= 0) && state.pending_user_inputs.is_empty() {
            Ok(DevState::Finalizing)
        } else {
            Ok(DevState::PhaseGenerating)
        }
    }

    /// `deepDebug` (spec 4.6, 4.8): single-flight, concurrent with `IDLE`
    /// but not with another deep-debug session. Persists the resulting
    /// transcript so a later call can resume with `previousTranscript`.
    pub async fn run_deep_debug(&self, issue: &str, focus_paths: &[String]) -> OrchestratorResult<String> {
        let _permit = self
            .guard
            .debug
            .try_lock()
            .map_err(|_| OrchestratorError::DebugInProgress)?;

        self.broadcaster
            .broadcast(ServerMessage::DeepDebugStarted { issue: issue.to_string() })
            .await;

        let state = self.store.get().await;
        let session_id = state.sandbox_instance_id.clone().unwrap_or_default();
        let runtime_errors = self
            .sandbox
            .fetch_runtime_errors(&session_id, false)
            .await
            .unwrap_or_default();

        let (tool_tx, mut tool_rx) = tokio::sync::mpsc::channel(16);
        let (chunk_tx, mut chunk_rx) = tokio::sync::mpsc::channel(16);
        let broadcaster = self.broadcaster.clone();
        let forward_tools = tokio::spawn(async move {
            while let Some(event) = tool_rx.recv().await {
                if let operations::deep_debug::DeepDebugChunk::ToolCall { name, arguments } = event {
                    broadcaster
                        .broadcast(ServerMessage::DeepDebugToolCall { name, arguments })
                        .await;
                }
            }
        });
        let broadcaster = self.broadcaster.clone();
        let forward_chunks = tokio::spawn(async move {
            while let Some(text) = chunk_rx.recv().await {
                broadcaster.broadcast(ServerMessage::DeepDebugChunk { text }).await;
            }
        });

        let transcript = operations::deep_debug(
            self.provider.as_ref(),
            issue,
            state.last_deep_debug_transcript.as_deref(),
            focus_paths,
            &runtime_errors,
            tool_tx,
            chunk_tx,
        )
        .await;
        let _ = forward_tools.await;
        let _ = forward_chunks.await;
        let transcript = transcript?;

        self.store
            .mutate(|s| s.last_deep_debug_transcript = Some(transcript.clone()))
            .await?;
        self.broadcaster.broadcast(ServerMessage::DeepDebugCompleted).await;
        Ok(transcript)
    }

    async fn run_reviewing(&self, _cycles_left: &mut u32) -> OrchestratorResult<DevState> {
        let reviewing_initiated = self.store.get().await.reviewing_initiated;
        if !reviewing_initiated {
            self.store.mutate(|s| s.reviewing_initiated = true).await?;
            info!("entering review for the first time; issues (if any) are surfaced to the user for auto-fix consent");
        }
        // TODO: a bounded auto-fix loop would decrement `_cycles_left` here and
        // re-enter `PhaseImplementing` while issues remain and cycles are left.
        Ok(DevState::Idle)
    }

    async fn run_finalizing(&self) -> OrchestratorResult<DevState> {
        let already = self.store.get().await.mvp_generated;
        if !already {
            info!("running finalization phase");
            self.store.mutate(|s| s.mvp_generated = true).await?;
        }
        Ok(DevState::Reviewing)
    }
}

/// Widens the retry-suggested backoff as `consecutive_rate_limits` climbs:
/// 30s, 60s, 120s, ... capped at 5 minutes (spec's "rate-limit backoff
/// bookkeeping" supplement).
fn backoff_secs(consecutive: u32) -> u64 {
    let shift = consecutive.saturating_sub(1).min(4);
    30u64.saturating_mul(1u64 << shift).min(300)
}

#[cfg(test)]
mod backoff_tests {
    use super::backoff_secs;

    #[test]
    fn widens_geometrically_and_caps() {
        assert_eq!(backoff_secs(1), 30);
        assert_eq!(backoff_secs(2), 60);
        assert_eq!(backoff_secs(3), 120);
        assert_eq!(backoff_secs(10), 300);
    }
}
