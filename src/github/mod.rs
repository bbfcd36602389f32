// src/github/mod.rs
// GitHub push collaborator (spec 4.7 `pushToGitHub`, 6). Exports all git
// objects from GitStore, assembles a commit graph atop a template base with
// the commit author date pinned to the project's `createdAt`, and pushes it
// to the caller-supplied remote. Reuses `run_blocking` from `git::store`'s
// idiom for the git2 calls and the same `GitError`/`IntoGitErrorResult`
// error plumbing.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use git2::{Repository, Signature};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::github::GitHubConfig;
use crate::git::error::{GitError, IntoGitError, IntoGitErrorResult};
use crate::git::{ExportedObject, GitResult};

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub token: String,
    pub username: String,
    pub email: String,
    pub repository_html_url: String,
    pub is_private: bool,
}

#[derive(Debug, Clone)]
pub struct PushResult {
    pub commit_sha: String,
    pub repository_url: String,
}

#[derive(Debug, Clone)]
pub struct PushMetadata {
    pub app_created_at: DateTime<Utc>,
    pub query: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// In-memory-only token cache (spec 6: "Token is cached in-memory with a
/// TTL ... never persisted").
pub struct GitHubPusher {
    config: GitHubConfig,
    cache: Mutex<Option<CachedToken>>,
}

impl GitHubPusher {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(None),
        }
    }

    async fn cache_token(&self, token: &str) {
        let mut guard = self.cache.lock().await;
        *guard = Some(CachedToken {
            token: token.to_string(),
            expires_at: Instant::now() + Duration::from_secs(self.config.token_cache_ttl_secs),
        });
    }

    async fn cached_token_still_valid(&self, token: &str) -> bool {
        let guard = self.cache.lock().await;
        matches!(
            guard.as_ref(),
            Some(cached) if cached.token == token && cached.expires_at > Instant::now()
        )
    }

    /// Exports objects from GitStore, rebuilds them atop a fresh clone of
    /// the template base, commits with the project's `createdAt` as author
    /// date, and pushes to `options.repository_html_url`.
    pub async fn push(
        &self,
        objects: Vec<ExportedObject>,
        metadata: PushMetadata,
        options: PushOptions,
    ) -> GitResult<PushResult> {
        if !self.cached_token_still_valid(&options.token).await {
            self.cache_token(&options.token).await;
        }

        info!(
            repo = %options.repository_html_url,
            file_count = objects.len(),
            "pushing exported objects to GitHub"
        );

        let template_base = self.config.template_base_repo.clone();
        let result = tokio::task::spawn_blocking(move || {
            push_blocking(objects, metadata, options, &template_base)
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(join_err) => Err(join_err.into_git_error()),
        }
    }
}

fn push_blocking(
    objects: Vec<ExportedObject>,
    metadata: PushMetadata,
    options: PushOptions,
    template_base: &str,
) -> GitResult<PushResult> {
    let workdir = tempfile::tempdir().into_git_error("creating scratch clone directory")?;
    let path: PathBuf = workdir.path().to_path_buf();

    let mut clone_builder = git2::build::RepoBuilder::new();
    let repo = clone_builder
        .clone(template_base, &path)
        .into_git_error("cloning template base repository")?;

    for object in &objects {
        let full_path = path.join(&object.path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).into_git_error("creating export directory")?;
        }
        std::fs::write(&full_path, &object.bytes).into_git_error("writing exported file")?;
    }

    let mut index = repo.index().into_git_error("opening repository index")?;
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .into_git_error("staging exported files")?;
    index.write().into_git_error("writing index")?;
    let tree_id = index.write_tree().into_git_error("writing tree")?;
    let tree = repo.find_tree(tree_id).into_git_error("looking up written tree")?;

    let author_time = metadata.app_created_at.timestamp();
    let signature = Signature::new(
        &options.username,
        &options.email,
        &git2::Time::new(author_time, 0),
    )
    .into_git_error("building author signature")?;

    let parent = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let message = if metadata.query.is_empty() {
        "Export generated project".to_string()
    } else {
        format!("Export generated project: {}", metadata.query)
    };

    let commit_oid = repo
        .commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)
        .into_git_error("creating export commit")?;

    let push_url = authed_remote_url(&options.repository_html_url, &options.token)?;
    let mut remote = repo
        .remote_anonymous(&push_url)
        .into_git_error("creating anonymous remote")?;
    remote
        .push(&["refs/heads/main:refs/heads/main"], None)
        .into_git_error("pushing to remote")?;

    Ok(PushResult {
        commit_sha: commit_oid.to_string(),
        repository_url: options.repository_html_url,
    })
}

fn authed_remote_url(repository_html_url: &str, token: &str) -> GitResult<String> {
    let without_scheme = repository_html_url
        .strip_prefix("https://")
        .ok_or_else(|| GitError::invalid_argument("repositoryHtmlUrl must be an https:// URL"))?;
    Ok(format!("https://x-access-token:{token}@{without_scheme}"))
}
