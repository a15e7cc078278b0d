//! The version-control capability interface.

use crate::error::Result;
use crate::target::BranchName;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name and email of a commit author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitAuthor {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

impl CommitAuthor {
    /// Create a commit author.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Operations on a local clone.
///
/// Every method receives the working directory explicitly so a single client
/// can serve independent runs concurrently.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Clone `remote_url` into the (empty, existing) directory `dir`.
    async fn clone_repo(&self, remote_url: &SecretString, dir: &Path) -> Result<()>;

    /// Create `name` from the current HEAD and check it out.
    async fn create_and_checkout_branch(&self, dir: &Path, name: &BranchName) -> Result<()>;

    /// Stage a path relative to `dir`.
    async fn stage_file(&self, dir: &Path, path: &Path) -> Result<()>;

    /// Commit staged changes with `author` as both author and committer.
    async fn commit(&self, dir: &Path, message: &str, author: &CommitAuthor) -> Result<()>;

    /// Push `local_ref` to `remote_ref` on `remote` with an explicit refspec.
    async fn push(&self, dir: &Path, remote: &str, local_ref: &str, remote_ref: &str)
    -> Result<()>;

    /// Author of the HEAD commit, or `None` when the repository has no commits.
    async fn last_commit_author(&self, dir: &Path) -> Result<Option<CommitAuthor>>;
}
