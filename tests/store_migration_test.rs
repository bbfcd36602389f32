// tests/store_migration_test.rs
// A legacy-shaped document persisted directly into `project_state` is
// migrated on `Store::load`, not just by calling `migrate()` in isolation.

use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;

use forge_orchestrator::store::Store;

#[tokio::test]
async fn load_migrates_a_legacy_document_and_persists_the_result() {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let legacy = json!({
        "id": "legacy-1",
        "user_id": "u1",
        "session_id": "s1",
        "hostname": "localhost",
        "created_at": chrono::Utc::now(),
        "query": "a legacy project",
        "images": [],
        "blueprint": {
            "title": "T", "project_name": "", "description": "d", "frameworks": [],
            "views": [], "user_flow": "", "architecture": "", "pitfalls": [],
            "implementation_roadmap": [],
            "initial_phase": {"id": "p1", "name": "Setup", "description": "", "files": [], "last_phase": false, "completed": false},
            "color_palette": []
        },
        "generated_files_map": {
            "a.ts": {"file_path": "a.ts", "file_contents": "x", "file_purpose": "p"}
        },
        "commands_history": [],
        "should_be_generating": false,
        "mvp_generated": false,
        "reviewing_initiated": false,
        "agent_mode": "deterministic",
        "phases_counter": 8,
        "pending_user_inputs": [],
        "current_dev_state": "IDLE",
        "conversation_messages": [],
        "inference_context": {},
        "consecutive_rate_limits": 0,
        "generated_phases": [],
    });
    let json_text = serde_json::to_string(&legacy).unwrap();

    sqlx::query!(
        "INSERT INTO project_state (project_id, state_json, updated_at) VALUES (?, ?, ?)",
        "legacy-1",
        json_text,
        chrono::Utc::now(),
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = Store::load(pool, "legacy-1").await.unwrap();
    let state = store.get().await;

    assert_eq!(state.generated_files_map["a.ts"].path, "a.ts");
    assert_eq!(state.generated_files_map["a.ts"].contents, "x");
    assert!(!state.project_name.is_empty(), "migration should have generated a project name");
    assert_eq!(state.schema_version, forge_orchestrator::migration::CURRENT_SCHEMA_VERSION);
}
