// src/store/mod.rs
// Single-writer, many-reader in-process state map (spec 4.1). Every write is
// persisted durably (SQLite, one row per project) before `set`/`mutate`
// returns, mirroring the teacher's checkpoint/budget modules' "write then
// acknowledge" sqlx pattern.

pub mod schema;

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::migration::migrate;
pub use schema::ProjectState;

/// In-process snapshot + durable-write wrapper around one project's state.
#[derive(Clone)]
pub struct Store {
    project_id: String,
    pool: SqlitePool,
    inner: Arc<RwLock<ProjectState>>,
}

impl Store {
    /// Loads `project_id` from the `project_state` table, running it through
    /// `MigrationEngine` (spec 4.10) before returning.
    pub async fn load(pool: SqlitePool, project_id: &str) -> OrchestratorResult<Self> {
        let row = sqlx::query!(
            "SELECT state_json FROM project_state WHERE project_id = ?",
            project_id
        )
        .fetch_optional(&pool)
        .await?;

        let row = row.ok_or_else(|| {
            OrchestratorError::not_found(format!("no persisted state for project {project_id}"))
        })?;

        let raw: serde_json::Value = serde_json::from_str(&row.state_json)?;
        let migrated = migrate(raw);
        let state: ProjectState = serde_json::from_value(migrated)?;

        let store = Self {
            project_id: project_id.to_string(),
            pool,
            inner: Arc::new(RwLock::new(state)),
        };
        // Persist the migrated form immediately so future loads skip re-migration.
        store.persist_current().await?;
        Ok(store)
    }

    /// Inserts a brand-new project row (used by `Orchestrator::initialize`).
    pub async fn create(pool: SqlitePool, state: ProjectState) -> OrchestratorResult<Self> {
        let store = Self {
            project_id: state.id.clone(),
            pool,
            inner: Arc::new(RwLock::new(state)),
        };
        store.persist_current().await?;
        Ok(store)
    }

    /// Read-only snapshot. Cheap: clones the in-memory state, never touches
    /// the database.
    pub async fn get(&self) -> ProjectState {
        self.inner.read().await.clone()
    }

    /// Total replace. Persists before returning.
    pub async fn set(&self, new_state: ProjectState) -> OrchestratorResult<()> {
        {
            let mut guard = self.inner.write().await;
            *guard = new_state;
        }
        self.persist_current().await
    }

    /// Compare-and-set: runs `f` against a mutable borrow of the current
    /// state, persists the result, and returns `f`'s output. The write lock
    /// is held for the duration of `f`, satisfying the single-writer
    /// invariant (spec 5) for any single `mutate` call.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ProjectState) -> T,
    ) -> OrchestratorResult<T> {
        let (result, snapshot) = {
            let mut guard = self.inner.write().await;
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.persist(&snapshot).await?;
        Ok(result)
    }

    async fn persist_current(&self) -> OrchestratorResult<()> {
        let snapshot = self.inner.read().await.clone();
        self.persist(&snapshot).await
    }

    async fn persist(&self, state: &ProjectState) -> OrchestratorResult<()> {
        let json = serde_json::to_string(state)?;
        let now = chrono::Utc::now();
        sqlx::query!(
            "INSERT INTO project_state (project_id, state_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(project_id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at",
            self.project_id,
            json,
            now,
        )
        .execute(&self.pool)
        .await?;
        debug!(project_id = %self.project_id, "persisted project state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{AgentMode, Blueprint, DevState, Phase};
    use std::collections::HashMap;

    fn sample_state(id: &str) -> ProjectState {
        ProjectState {
            id: id.to_string(),
            user_id: "u1".into(),
            session_id: "s1".into(),
            hostname: "localhost".into(),
            created_at: chrono::Utc::now(),
            query: "build a todo app".into(),
            images: vec![],
            blueprint: Blueprint {
                title: "Todo".into(),
                project_name: "todo-app".into(),
                description: "A todo app".into(),
                frameworks: vec!["react".into()],
                views: vec![],
                user_flow: String::new(),
                architecture: String::new(),
                pitfalls: vec![],
                implementation_roadmap: vec![],
                initial_phase: Phase {
                    id: "p1".into(),
                    name: "Setup".into(),
                    description: "setup".into(),
                    files: vec![],
                    last_phase: false,
                    completed: false,
                },
                color_palette: vec![],
            },
            project_name: "todo-app".into(),
            template_name: "react-vite-cf".into(),
            template_details: None,
            generated_phases: vec![],
            generated_files_map: HashMap::new(),
            commands_history: vec![],
            last_package_json: None,
            sandbox_instance_id: None,
            should_be_generating: false,
            mvp_generated: false,
            reviewing_initiated: false,
            agent_mode: AgentMode::Deterministic,
            phases_counter: 8,
            pending_user_inputs: vec![],
            current_dev_state: DevState::Idle,
            review_cycles: None,
            current_phase: None,
            conversation_messages: vec![],
            project_updates_accumulator: vec![],
            inference_context: Default::default(),
            last_deep_debug_transcript: None,
            schema_version: crate::migration::CURRENT_SCHEMA_VERSION,
            consecutive_rate_limits: 0,
        }
    }

    #[tokio::test]
    async fn mutate_persists_and_returns_value() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let store = Store::create(pool.clone(), sample_state("proj-1")).await.unwrap();
        let counter_before = store.get().await.phases_counter;
        assert_eq!(counter_before, 8);

        let new_counter = store
            .mutate(|s| {
                s.phases_counter -= 1;
                s.phases_counter
            })
            .await
            .unwrap();
        assert_eq!(new_counter, 7);
        assert_eq!(store.get().await.phases_counter, 7);

        let reloaded = Store::load(pool, "proj-1").await.unwrap();
        assert_eq!(reloaded.get().await.phases_counter, 7);
    }
}
