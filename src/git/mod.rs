// src/git/mod.rs

pub mod error;
pub mod store;

pub use error::{GitError, GitResult, IntoGitError, IntoGitErrorResult};
pub use store::{CommitDetail, CommitInfo, ExportedObject, GitStore};
