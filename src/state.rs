// src/state.rs
// Application state shared across handlers (spec 4.1, 4.7): owns the
// process-wide collaborator clients (sandbox, registry, github, model
// inference) plus a cache of per-project `Orchestrator`s, built lazily on
// first access and kept warm for the life of the process. Grounded on the
// teacher's `AppState::new(pool) -> Result<Self>` sequential `info!`-logged
// `Arc::new(...)` wiring pattern, generalized from one global service
// composition to one composition per project.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::info;

use crate::broadcaster::Broadcaster;
use crate::config::CONFIG;
use crate::conversation::ConversationLog;
use crate::deployment::DeploymentManager;
use crate::error::OrchestratorResult;
use crate::files::{self, FileManager};
use crate::git::GitStore;
use crate::github::GitHubPusher;
use crate::operations::InferenceClient;
use crate::orchestrator::Orchestrator;
use crate::registry::RegistryClient;
use crate::sandbox::SandboxClient;
use crate::state_machine::StateMachine;
use crate::store::schema::ProjectState;
use crate::store::Store;

/// Everything held in common by every project's `Orchestrator`.
struct Shared {
    pool: SqlitePool,
    sandbox: Arc<SandboxClient>,
    registry: Arc<RegistryClient>,
    github: Arc<GitHubPusher>,
    provider: Arc<InferenceClient>,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    shared: Arc<Shared>,
    orchestrators: Arc<RwLock<HashMap<String, Arc<Orchestrator>>>>,
}

impl AppState {
    pub async fn new(pool: SqlitePool) -> OrchestratorResult<Self> {
        info!("Initializing sandbox client");
        let sandbox = Arc::new(SandboxClient::new(CONFIG.sandbox.clone()));

        info!("Initializing registry client");
        let registry = Arc::new(RegistryClient::new(CONFIG.registry.clone()));

        info!("Initializing GitHub push collaborator");
        let github = Arc::new(GitHubPusher::new(CONFIG.github.clone()));

        info!("Initializing model-inference client");
        let provider = Arc::new(InferenceClient::new(CONFIG.inference.clone()));

        info!("Application state initialized");

        Ok(Self {
            shared: Arc::new(Shared { pool, sandbox, registry, github, provider }),
            orchestrators: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.shared.pool
    }

    pub fn conversation_log(&self, session_id: &str) -> ConversationLog {
        ConversationLog::new(self.shared.pool.clone(), session_id)
    }

    /// Returns the cached `Orchestrator` for `project_id`, building it (and
    /// loading its persisted `ProjectState`) on first access.
    pub async fn orchestrator(&self, project_id: &str) -> OrchestratorResult<Arc<Orchestrator>> {
        if let Some(existing) = self.orchestrators.read().await.get(project_id) {
            return Ok(existing.clone());
        }

        let store = Arc::new(Store::load(self.shared.pool.clone(), project_id).await?);
        let orchestrator = self.build(store).await?;

        let mut guard = self.orchestrators.write().await;
        let orchestrator = guard.entry(project_id.to_string()).or_insert(orchestrator).clone();
        Ok(orchestrator)
    }

    /// Registers a brand-new project and returns its freshly-built
    /// `Orchestrator` (used by the project-creation HTTP endpoint).
    pub async fn create_project(&self, state: ProjectState) -> OrchestratorResult<Arc<Orchestrator>> {
        let project_id = state.id.clone();
        let store = Arc::new(Store::create(self.shared.pool.clone(), state).await?);
        let orchestrator = self.build(store).await?;
        self.orchestrators.write().await.insert(project_id, orchestrator.clone());
        Ok(orchestrator)
    }

    /// `initialize` (spec 4.7): plans a Blueprint from the user's query via
    /// PlanBlueprint, then creates the project.
    pub async fn create_project_from_query(
        &self,
        id: String,
        user_id: String,
        session_id: String,
        hostname: String,
        query: String,
        images: Vec<String>,
    ) -> OrchestratorResult<Arc<Orchestrator>> {
        let blueprint = crate::operations::plan_blueprint(
            self.shared.provider.as_ref(),
            &query,
            &crate::operations::types::UserContext::default(),
        )
        .await?;

        let now = chrono::Utc::now();
        let project_name = blueprint.project_name.clone();
        let state = ProjectState {
            id,
            user_id,
            session_id,
            hostname,
            created_at: now,
            query,
            images,
            project_name,
            template_name: "react-vite-cf".to_string(),
            template_details: None,
            generated_phases: Vec::new(),
            generated_files_map: HashMap::new(),
            commands_history: Vec::new(),
            last_package_json: None,
            sandbox_instance_id: None,
            should_be_generating: true,
            mvp_generated: false,
            reviewing_initiated: false,
            agent_mode: Default::default(),
            phases_counter: CONFIG.phases_counter_default as i64,
            pending_user_inputs: Vec::new(),
            current_dev_state: Default::default(),
            review_cycles: None,
            current_phase: None,
            conversation_messages: Vec::new(),
            project_updates_accumulator: Vec::new(),
            inference_context: Default::default(),
            last_deep_debug_transcript: None,
            schema_version: crate::migration::CURRENT_SCHEMA_VERSION,
            consecutive_rate_limits: 0,
            blueprint,
        };

        let orchestrator = self.create_project(state).await?;

        let customized = customize_template_files(&orchestrator.store.get().await.project_name);
        orchestrator
            .files
            .save_generated_files(customized, Some("Initialize project configuration files"))
            .await?;

        self.kick_off_post_init(orchestrator.clone());

        Ok(orchestrator)
    }

    /// `initialize`'s async kickoff (spec 4.7): sandbox deploy, default
    /// setup-command execution, and README generation all run in the
    /// background rather than blocking the response to the caller.
    fn kick_off_post_init(&self, orchestrator: Arc<Orchestrator>) {
        // Setup commands need `sandbox_instance_id`, which the sandbox
        // deploy sets; chained in one task rather than two independent
        // spawns so the setup command can't race ahead of the deploy.
        let deploy_target = orchestrator.clone();
        tokio::spawn(async move {
            if let Err(err) = deploy_target.deploy_to_sandbox(false, None, false).await {
                tracing::warn!(%err, "post-init sandbox deploy failed");
                return;
            }
            if let Err(err) = deploy_target
                .exec_commands(vec!["bun install".to_string()], true, None)
                .await
            {
                tracing::warn!(%err, "post-init setup command failed");
            }
        });

        let readme_target = orchestrator;
        let provider = self.shared.provider.clone();
        tokio::spawn(async move {
            let state = readme_target.store.get().await;
            let blank = crate::operations::types::ImplementedFile {
                path: "README.md".to_string(),
                contents: String::new(),
                purpose: "project readme".to_string(),
            };
            let issues = vec![format!(
                "Write a README for a project described as: {}",
                state.query
            )];
            match crate::operations::regenerate_file(provider.as_ref(), &blank, &issues).await {
                Ok(readme) => {
                    if let Err(err) = readme_target
                        .files
                        .save_generated_files(
                            vec![(readme.path, readme.contents, readme.purpose)],
                            None,
                        )
                        .await
                    {
                        tracing::warn!(%err, "saving generated README failed");
                    }
                }
                Err(err) => tracing::warn!(%err, "post-init README generation failed"),
            }
        });
    }

    async fn build(&self, store: Arc<Store>) -> OrchestratorResult<Arc<Orchestrator>> {
        let project_id = store.get().await.id.clone();

        let git = Arc::new(GitStore::new(&CONFIG.repos_root, &project_id));
        git.init().await?;

        let file_manager = Arc::new(FileManager::new(store.clone(), git.clone()));
        files::wire_sync_callback(file_manager.clone(), &git);

        let broadcaster = Arc::new(Broadcaster::new());
        let deployment = Arc::new(DeploymentManager::new(store.clone(), self.shared.sandbox.clone()));
        let state_machine = Arc::new(StateMachine::new(
            store.clone(),
            git.clone(),
            file_manager.clone(),
            self.shared.sandbox.clone(),
            broadcaster.clone(),
            self.shared.provider.clone(),
        ));

        Ok(Arc::new(Orchestrator::new(
            store,
            git,
            file_manager,
            self.shared.sandbox.clone(),
            broadcaster,
            deployment,
            self.shared.registry.clone(),
            self.shared.github.clone(),
            state_machine,
            self.shared.provider.clone(),
        )))
    }
}

/// `initialize`'s template-customization step (spec 4.7): stamps the
/// project's chosen name into the files every fresh project needs before
/// any phase has generated anything.
fn customize_template_files(project_name: &str) -> Vec<(String, String, String)> {
    let package_json = format!(
        "{{\n  \"name\": \"{project_name}\",\n  \"private\": true,\n  \"version\": \"0.0.0\",\n  \"scripts\": {{\n    \"dev\": \"vite\",\n    \"build\": \"vite build\"\n  }}\n}}\n"
    );
    let wrangler_jsonc = format!(
        "{{\n  // Cloudflare Workers configuration for {project_name}.\n  \"name\": \"{project_name}\",\n  \"compatibility_date\": \"2024-01-01\"\n}}\n"
    );
    let bootstrap = "#!/usr/bin/env node\n// Regenerated from commandsHistory; replays setup for a cold-start clone.\nconst { execSync } = require('child_process');\n\nconst commands = [\n];\n\nfor (const cmd of commands) {\n  console.log(`$ ${cmd}`);\n  execSync(cmd, { stdio: 'inherit' });\n}\n".to_string();
    let gitignore = "node_modules/\ndist/\n.wrangler/\n.env\n".to_string();

    vec![
        ("package.json".to_string(), package_json, "project manifest".to_string()),
        ("wrangler.jsonc".to_string(), wrangler_jsonc, "cloudflare config".to_string()),
        (".bootstrap.js".to_string(), bootstrap, "setup".to_string()),
        (".gitignore".to_string(), gitignore, "vcs ignore rules".to_string()),
    ]
}
