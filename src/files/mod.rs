// src/files/mod.rs
// FileManager (spec 4.4): merges template files with generated files and
// keeps the generated-files union in step with GitStore HEAD.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use similar::TextDiff;
use tracing::{debug, info};

use crate::error::OrchestratorResult;
use crate::git::GitStore;
use crate::store::schema::{GeneratedFile, TemplateDetails};
use crate::store::Store;

/// Merges the template base with the generated-files overlay (spec 4.4) and
/// keeps `generatedFilesMap` synchronized with `GitStore` HEAD.
pub struct FileManager {
    store: Arc<Store>,
    git: Arc<GitStore>,
}

impl FileManager {
    pub fn new(store: Arc<Store>, git: Arc<GitStore>) -> Self {
        Self { store, git }
    }

    /// `getAllFiles()` = template ∪ generated (generated wins on collision).
    pub async fn get_all_files(&self) -> HashMap<String, String> {
        let state = self.store.get().await;
        let mut files: HashMap<String, String> = state
            .template_details
            .as_ref()
            .map(|t| t.all_files.clone())
            .unwrap_or_default();
        for (path, generated) in state.generated_files_map.iter() {
            files.insert(path.clone(), generated.contents.clone());
        }
        files
    }

    /// `getAllRelevantFiles()` = important-template ∪ generated, with
    /// template files on the redaction list dropped from the template half
    /// only (a generated file at the same path still wins, per the union
    /// rule above).
    pub async fn get_all_relevant_files(&self) -> HashMap<String, String> {
        let state = self.store.get().await;
        let mut files = HashMap::new();
        if let Some(template) = state.template_details.as_ref() {
            for path in &template.important_files {
                if template.redacted_files.contains(path) {
                    continue;
                }
                if let Some(contents) = template.all_files.get(path) {
                    files.insert(path.clone(), contents.clone());
                }
            }
        }
        for (path, generated) in state.generated_files_map.iter() {
            files.insert(path.clone(), generated.contents.clone());
        }
        files
    }

    /// `saveGeneratedFiles(files[], commitMessage?)` (spec 4.4): computes
    /// per-file `lastDiff` against the prior contents (falling back to the
    /// template base, then empty), updates the store, then stages or
    /// commits via GitStore depending on whether a commit message is given.
    pub async fn save_generated_files(
        &self,
        files: Vec<(String, String, String)>, // (path, contents, purpose)
        commit_message: Option<&str>,
    ) -> OrchestratorResult<()> {
        if files.is_empty() {
            return Ok(());
        }
        let template_base = self
            .store
            .get()
            .await
            .template_details
            .map(|t| t.all_files)
            .unwrap_or_default();

        let mut staged = Vec::with_capacity(files.len());
        self.store
            .mutate(|state| {
                for (path, contents, purpose) in files {
                    let prior = state
                        .generated_files_map
                        .get(&path)
                        .map(|f| f.contents.clone())
                        .or_else(|| template_base.get(&path).cloned())
                        .unwrap_or_default();
                    let last_diff = unified_diff(&path, &prior, &contents);
                    state.generated_files_map.insert(
                        path.clone(),
                        GeneratedFile {
                            path: path.clone(),
                            contents: contents.clone(),
                            purpose,
                            last_diff,
                            last_modified: Utc::now(),
                        },
                    );
                    staged.push((path, contents));
                }
            })
            .await?;

        match commit_message {
            Some(message) => {
                info!(file_count = staged.len(), "committing generated files");
                self.git.commit(staged, message).await?;
            }
            None => {
                debug!(file_count = staged.len(), "staging generated files");
                self.git.stage(staged).await?;
            }
        }
        Ok(())
    }

    /// `deleteFiles(paths)` (spec 4.4): removes from the store only. Sandbox
    /// deletion is a separate step owned by the caller.
    pub async fn delete_files(&self, paths: &[String]) -> OrchestratorResult<()> {
        self.store
            .mutate(|state| {
                for path in paths {
                    state.generated_files_map.remove(path);
                }
            })
            .await
    }

    /// `syncFromHead()` (spec 4.4): rebuilds `generatedFilesMap` from
    /// GitStore HEAD, preserving `purpose` from the prior map for paths that
    /// survive. Invoked from the GitStore files-changed callback (spec 4.3,
    /// 9) so the store never drifts from HEAD after an out-of-band commit
    /// or reset.
    pub async fn sync_from_head(&self) -> OrchestratorResult<()> {
        let head_files = self.git.get_all_files_from_head().await?;
        self.store
            .mutate(|state| {
                let previous = std::mem::take(&mut state.generated_files_map);
                for (path, contents) in head_files {
                    let purpose = previous
                        .get(&path)
                        .map(|f| f.purpose.clone())
                        .unwrap_or_default();
                    let last_diff = previous
                        .get(&path)
                        .map(|f| f.last_diff.clone())
                        .unwrap_or_default();
                    state.generated_files_map.insert(
                        path.clone(),
                        GeneratedFile {
                            path,
                            contents,
                            purpose,
                            last_diff,
                            last_modified: Utc::now(),
                        },
                    );
                }
            })
            .await
    }

    pub async fn set_template_details(&self, details: TemplateDetails) -> OrchestratorResult<()> {
        self.store
            .mutate(|state| state.template_details = Some(details))
            .await
    }
}

/// Wires `sync_from_head` as the GitStore files-changed callback (spec 9's
/// one-way-callback cycle-breaking pattern: GitStore never calls back into
/// FileManager synchronously, only schedules the resync).
pub fn wire_sync_callback(file_manager: Arc<FileManager>, git: &GitStore) {
    git.set_on_files_changed_callback(Box::new(move || {
        let fm = file_manager.clone();
        tokio::spawn(async move {
            if let Err(err) = fm.sync_from_head().await {
                tracing::warn!(%err, "syncFromHead failed after GitStore change notification");
            }
        });
    }));
}

fn unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(path, path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_is_empty_for_identical_contents() {
        assert_eq!(unified_diff("a.rs", "same", "same"), "");
    }

    #[test]
    fn unified_diff_reflects_a_change() {
        let diff = unified_diff("a.rs", "line one\n", "line two\n");
        assert!(diff.contains("-line one"));
        assert!(diff.contains("+line two"));
    }
}
