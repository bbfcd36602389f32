// tests/git_files_integration_test.rs
// FileManager -> GitStore round trip: a save lands in the generated-files
// map and survives a re-read of the commit HEAD wrote.

mod common;

use std::sync::Arc;

use forge_orchestrator::files::FileManager;
use forge_orchestrator::git::GitStore;
use forge_orchestrator::store::Store;
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::test]
async fn save_generated_files_commits_and_round_trips_from_head() {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let project_id = "integration-proj-1";
    let store = Arc::new(Store::create(pool, common::sample_state(project_id)).await.unwrap());

    let repos_root = tempfile::tempdir().unwrap();
    let git = Arc::new(GitStore::new(repos_root.path(), project_id));
    git.init().await.unwrap();

    let files = FileManager::new(store.clone(), git.clone());
    files
        .save_generated_files(
            vec![("src/App.tsx".to_string(), "export default function App() {}".to_string(), "entry".to_string())],
            Some("Initialize project configuration files"),
        )
        .await
        .unwrap();

    let state = store.get().await;
    assert_eq!(state.generated_files_map.len(), 1);
    assert_eq!(
        state.generated_files_map["src/App.tsx"].contents,
        "export default function App() {}"
    );

    let from_head = git.get_all_files_from_head().await.unwrap();
    assert_eq!(from_head.get("src/App.tsx").map(String::as_str), Some("export default function App() {}"));

    let log = git.log(10).await.unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn second_save_computes_a_nonempty_diff_against_the_first() {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let project_id = "integration-proj-2";
    let store = Arc::new(Store::create(pool, common::sample_state(project_id)).await.unwrap());

    let repos_root = tempfile::tempdir().unwrap();
    let git = Arc::new(GitStore::new(repos_root.path(), project_id));
    git.init().await.unwrap();

    let files = FileManager::new(store.clone(), git.clone());
    files
        .save_generated_files(vec![("a.txt".to_string(), "one\n".to_string(), "note".to_string())], Some("first"))
        .await
        .unwrap();
    files
        .save_generated_files(vec![("a.txt".to_string(), "one\ntwo\n".to_string(), "note".to_string())], Some("second"))
        .await
        .unwrap();

    let state = store.get().await;
    assert!(!state.generated_files_map["a.txt"].last_diff.is_empty());
}
