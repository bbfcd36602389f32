// src/git/store.rs
// Content-addressed version control over the generated-files union (spec
// 4.3). One on-disk git2 repository per project, rooted under
// `CONFIG.repos_root`. Every blocking git2 call runs inside
// `spawn_blocking`, mirroring the teacher's `GitOperations::clone_repo`
// pattern in `git/client/operations.rs`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Signature};
use tracing::{debug, warn};

use super::error::{GitError, GitResult, IntoGitError, IntoGitErrorResult};

/// One committed revision, as returned by `log`/`show` (spec 4.3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitInfo {
    pub oid: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
}

/// `show(oid, {includeDiff})` result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitDetail {
    pub commit: CommitInfo,
    pub files: Vec<String>,
    /// Populated only when `include_diff=true`; unified diff per changed path.
    pub diffs: HashMap<String, String>,
}

/// `exportObjects()` entry (spec 4.3, 6 GitHub push).
pub struct ExportedObject {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Registered via `set_on_files_changed_callback` (spec 9: breaks the
/// `GitStore -> FileManager -> Store` cycle with a one-way callback; GitStore
/// itself never imports FileManager).
pub type FilesChangedCallback = Box<dyn Fn() + Send + Sync>;

/// Content-addressed store for one project's generated files.
pub struct GitStore {
    repo_path: PathBuf,
    on_files_changed: std::sync::Mutex<Option<FilesChangedCallback>>,
}

/// Runs a blocking git2 closure on the blocking pool, flattening the
/// `JoinError` layer into `GitError` the same way as a successful `?` chain.
async fn run_blocking<T, F>(f: F) -> GitResult<T>
where
    F: FnOnce() -> GitResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(inner) => inner,
        Err(join_err) => Err(join_err.into_git_error()),
    }
}

impl GitStore {
    pub fn new(repos_root: impl AsRef<Path>, project_id: &str) -> Self {
        Self {
            repo_path: repos_root.as_ref().join(project_id),
            on_files_changed: std::sync::Mutex::new(None),
        }
    }

    pub fn set_on_files_changed_callback(&self, cb: FilesChangedCallback) {
        *self.on_files_changed.lock().unwrap() = Some(cb);
    }

    fn notify_files_changed(&self) {
        if let Some(cb) = self.on_files_changed.lock().unwrap().as_ref() {
            cb();
        }
    }

    /// Idempotent: opens the repo if it exists, otherwise creates it with an
    /// empty initial commit on `main`.
    pub async fn init(&self) -> GitResult<()> {
        let path = self.repo_path.clone();
        run_blocking(move || {
            if path.join(".git").exists() {
                return Ok(());
            }
            std::fs::create_dir_all(&path).into_git_error("creating repo directory")?;
            let repo = Repository::init(&path).into_git_error("initializing repository")?;
            let sig = default_signature()?;
            let tree_id = {
                let mut index = repo.index().into_git_error("opening index")?;
                index.write_tree().into_git_error("writing empty tree")?
            };
            let tree = repo.find_tree(tree_id).into_git_error("finding tree")?;
            repo.commit(Some("HEAD"), &sig, &sig, "Initialize repository", &tree, &[])
                .into_git_error("creating initial commit")?;
            Ok(())
        })
        .await
    }

    /// Writes `files` into the index without committing.
    pub async fn stage(&self, files: Vec<(String, String)>) -> GitResult<()> {
        let path = self.repo_path.clone();
        run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            write_files_to_working_tree(&path, &files)?;
            let mut index = repo.index().into_git_error("opening index")?;
            for (file_path, _) in &files {
                index
                    .add_path(Path::new(file_path))
                    .into_git_error("staging file")?;
            }
            index.write().into_git_error("writing index")?;
            Ok(())
        })
        .await
    }

    /// `commit(files, message)`. `files == []` commits whatever is currently
    /// staged. Returns the new commit oid as a hex string.
    pub async fn commit(
        &self,
        files: Vec<(String, String)>,
        message: &str,
    ) -> GitResult<String> {
        if !files.is_empty() {
            self.stage(files).await?;
        }
        let path = self.repo_path.clone();
        let message = message.to_string();
        let oid = run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            let sig = default_signature()?;
            let tree_id = {
                let mut index = repo.index().into_git_error("opening index")?;
                index.write_tree().into_git_error("writing tree")?
            };
            let tree = repo.find_tree(tree_id).into_git_error("finding tree")?;
            let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

            // No-op guard (spec 8 testable property 2: idempotent save):
            // an identical tree to the current HEAD creates no new commit.
            if let Some(ref parent_commit) = parent {
                if parent_commit.tree_id() == tree_id {
                    return Ok(parent_commit.id().to_string());
                }
            }

            let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();
            let oid = repo
                .commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)
                .into_git_error("creating commit")?;
            Ok(oid.to_string())
        })
        .await?;

        self.notify_files_changed();
        debug!(oid = %oid, "git commit created");
        Ok(oid)
    }

    pub async fn log(&self, limit: usize) -> GitResult<Vec<CommitInfo>> {
        let path = self.repo_path.clone();
        run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            let mut revwalk = repo.revwalk().into_git_error("creating revwalk")?;
            revwalk.push_head().into_git_error("pushing HEAD")?;
            let mut out = Vec::new();
            for oid in revwalk.take(limit) {
                let oid = oid.into_git_error("reading revwalk entry")?;
                let commit = repo.find_commit(oid).into_git_error("finding commit")?;
                out.push(commit_info(&commit));
            }
            Ok(out)
        })
        .await
    }

    pub async fn show(&self, oid: &str, include_diff: bool) -> GitResult<CommitDetail> {
        let path = self.repo_path.clone();
        let oid = oid.to_string();
        run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            let commit_oid = git2::Oid::from_str(&oid)
                .map_err(|e| GitError::invalid_argument(format!("bad oid {oid}: {e}")))?;
            let commit = repo
                .find_commit(commit_oid)
                .map_err(|_| GitError::not_found(format!("commit {oid}")))?;
            let tree = commit.tree().into_git_error("reading commit tree")?;

            let mut files = Vec::new();
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(git2::ObjectType::Blob) {
                    files.push(format!("{root}{}", entry.name().unwrap_or_default()));
                }
                git2::TreeWalkResult::Ok
            })
            .into_git_error("walking tree")?;

            let mut diffs = HashMap::new();
            if include_diff {
                let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
                let diff = repo
                    .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                    .into_git_error("diffing trees")?;
                let mut current_path = String::new();
                let mut current_diff = String::new();
                diff.print(git2::DiffFormat::Patch, |delta, _hunk, line| {
                    let path = delta
                        .new_file()
                        .path()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default();
                    if path != current_path {
                        if !current_path.is_empty() {
                            diffs.insert(current_path.clone(), std::mem::take(&mut current_diff));
                        }
                        current_path = path;
                    }
                    current_diff.push_str(&String::from_utf8_lossy(line.content()));
                    true
                })
                .into_git_error("printing diff")?;
                if !current_path.is_empty() {
                    diffs.insert(current_path, current_diff);
                }
            }

            Ok(CommitDetail {
                commit: commit_info(&commit),
                files,
                diffs,
            })
        })
        .await
    }

    /// Destructive: moves HEAD and rewrites the working tree. Callers must
    /// surface an explicit warning (spec 4.3).
    pub async fn reset(&self, oid: &str, hard: bool) -> GitResult<()> {
        warn!(oid = %oid, hard, "git reset: destructive working-tree rewrite");
        let path = self.repo_path.clone();
        let oid = oid.to_string();
        run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            let commit_oid = git2::Oid::from_str(&oid)
                .map_err(|e| GitError::invalid_argument(format!("bad oid {oid}: {e}")))?;
            let object = repo
                .find_object(commit_oid, None)
                .into_git_error("finding object")?;
            let kind = if hard {
                git2::ResetType::Hard
            } else {
                git2::ResetType::Mixed
            };
            repo.reset(&object, kind, None).into_git_error("resetting")?;
            Ok(())
        })
        .await?;
        self.notify_files_changed();
        Ok(())
    }

    /// Enumerates file contents at HEAD (drives `FileManager::sync_from_head`).
    pub async fn get_all_files_from_head(&self) -> GitResult<HashMap<String, String>> {
        let path = self.repo_path.clone();
        run_blocking(move || {
            let repo = Repository::open(&path).into_git_error("opening repository")?;
            let head = repo.head().into_git_error("reading HEAD")?;
            let commit = head.peel_to_commit().into_git_error("peeling HEAD to commit")?;
            let tree = commit.tree().into_git_error("reading commit tree")?;
            read_blobs(&repo, &tree)
        })
        .await
    }

    /// Flat `[{path, bytes}]` export suitable for pushing to an external
    /// remote (spec 4.3, GitHub push).
    pub async fn export_objects(&self) -> GitResult<Vec<ExportedObject>> {
        let files = self.get_all_files_from_head().await?;
        Ok(files
            .into_iter()
            .map(|(path, contents)| ExportedObject {
                path,
                bytes: contents.into_bytes(),
            })
            .collect())
    }
}

fn read_blobs(repo: &Repository, tree: &git2::Tree) -> GitResult<HashMap<String, String>> {
    let mut files = HashMap::new();
    let mut err: Option<GitError> = None;
    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return git2::TreeWalkResult::Ok;
        }
        let full_path = format!("{root}{}", entry.name().unwrap_or_default());
        match entry.to_object(repo).and_then(|o| o.peel_to_blob()) {
            Ok(blob) => {
                files.insert(full_path, String::from_utf8_lossy(blob.content()).to_string());
                git2::TreeWalkResult::Ok
            }
            Err(e) => {
                err = Some(e.into_git_error());
                git2::TreeWalkResult::Abort
            }
        }
    })
    .into_git_error("walking tree for blobs")?;
    if let Some(e) = err {
        return Err(e);
    }
    Ok(files)
}

fn write_files_to_working_tree(repo_path: &Path, files: &[(String, String)]) -> GitResult<()> {
    for (rel_path, contents) in files {
        let full_path = repo_path.join(rel_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).into_git_error("creating parent directory")?;
        }
        std::fs::write(&full_path, contents).into_git_error("writing generated file")?;
    }
    Ok(())
}

fn commit_info(commit: &git2::Commit) -> CommitInfo {
    let time = commit.time();
    let timestamp = Utc
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now);
    CommitInfo {
        oid: commit.id().to_string(),
        message: commit.message().unwrap_or_default().to_string(),
        timestamp,
        author: commit.author().name().unwrap_or("unknown").to_string(),
    }
}

fn default_signature() -> GitResult<Signature<'static>> {
    Signature::now("forge-orchestrator", "orchestrator@forge.local")
        .into_git_error("building commit signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::new(dir.path(), "proj-1");
        store.init().await.unwrap();
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn commit_then_log_returns_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::new(dir.path(), "proj-1");
        store.init().await.unwrap();

        let oid = store
            .commit(vec![("src/App.tsx".into(), "export default App;".into())], "Initial phase")
            .await
            .unwrap();

        let log = store.log(10).await.unwrap();
        assert_eq!(log[0].oid, oid);
        assert_eq!(log[0].message, "Initial phase");
    }

    #[tokio::test]
    async fn identical_commit_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::new(dir.path(), "proj-1");
        store.init().await.unwrap();

        let files = vec![("src/App.tsx".into(), "same".into())];
        let first = store.commit(files.clone(), "m1").await.unwrap();
        let second = store.commit(files, "m2").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn get_all_files_from_head_reflects_commits() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::new(dir.path(), "proj-1");
        store.init().await.unwrap();
        store
            .commit(vec![("a.ts".into(), "1".into()), ("b.ts".into(), "2".into())], "m")
            .await
            .unwrap();

        let files = store.get_all_files_from_head().await.unwrap();
        assert_eq!(files.get("a.ts").map(String::as_str), Some("1"));
        assert_eq!(files.get("b.ts").map(String::as_str), Some("2"));
    }
}
