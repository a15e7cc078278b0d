//! Local side of a run: clone, branch, inject, commit, push.

use super::context::{Artifact, LifecycleContext};
use pipeprobe_core::{Error, Result, VcsClient};
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Drives the [`VcsClient`] through the steps that prepare the remote branch.
pub struct RepoStaging {
    vcs: Arc<dyn VcsClient>,
    remote: String,
}

impl RepoStaging {
    /// Create a stager pushing to `remote`.
    #[must_use]
    pub fn new(vcs: Arc<dyn VcsClient>, remote: impl Into<String>) -> Self {
        Self {
            vcs,
            remote: remote.into(),
        }
    }

    fn workdir(ctx: &LifecycleContext) -> Result<&Path> {
        ctx.workdir()
            .ok_or_else(|| Error::configuration("working directory missing"))
    }

    /// Create a fresh working directory and clone the target into it.
    ///
    /// The directory is owned by the context before cloning starts, so it is
    /// removed by cleanup even when the clone fails halfway.
    pub async fn clone(&self, ctx: &mut LifecycleContext, url: &SecretString) -> Result<()> {
        let target = ctx.target().to_string();
        let dir = tempfile::Builder::new()
            .prefix("pipeprobe-")
            .tempdir()
            .map_err(|e| Error::Clone {
                target: target.clone(),
                source: Box::new(Error::io("create working directory", None, e)),
            })?;
        debug!(dir = %dir.path().display(), "Created working directory");
        ctx.set_workdir(dir);

        let dir = Self::workdir(ctx)?;
        self.vcs
            .clone_repo(url, dir)
            .await
            .map_err(|e| Error::Clone {
                target,
                source: Box::new(e),
            })?;
        info!(target = %ctx.target(), "Cloned repository");
        Ok(())
    }

    /// Create and check out the run's branch.
    pub async fn branch(&self, ctx: &mut LifecycleContext) -> Result<()> {
        let dir = Self::workdir(ctx)?;
        self.vcs
            .create_and_checkout_branch(dir, ctx.branch())
            .await
            .map_err(|e| Error::Branch {
                branch: ctx.branch().to_string(),
                source: Box::new(e),
            })?;
        ctx.record(Artifact::LocalBranch);
        Ok(())
    }

    /// Write the caller's pipeline file to its platform location and stage it.
    ///
    /// Missing parent directories are created; an existing definition is overwritten.
    pub async fn inject(&self, ctx: &mut LifecycleContext) -> Result<()> {
        let dir = Self::workdir(ctx)?.to_path_buf();
        let source = ctx.pipeline_file().to_path_buf();
        let relative = ctx.pipeline_path().to_path_buf();
        let destination = dir.join(&relative);

        let content = tokio::fs::read(&source)
            .await
            .map_err(|e| injection_error(&source, "cannot read pipeline file", e))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| injection_error(&destination, "cannot create directory", e))?;
        }
        tokio::fs::write(&destination, &content)
            .await
            .map_err(|e| injection_error(&destination, "cannot write pipeline file", e))?;

        self.vcs
            .stage_file(&dir, &relative)
            .await
            .map_err(|e| injection_error(&relative, "cannot stage pipeline file", e))?;
        debug!(path = %relative.display(), bytes = content.len(), "Injected pipeline file");
        Ok(())
    }

    /// Commit the staged file as the author of the current HEAD commit.
    pub async fn commit(&self, ctx: &mut LifecycleContext) -> Result<()> {
        let dir = Self::workdir(ctx)?;
        let author = self
            .vcs
            .last_commit_author(dir)
            .await
            .map_err(|e| Error::Commit {
                message: "cannot read the last commit author".to_string(),
                source: Some(Box::new(e)),
            })?
            .ok_or_else(|| Error::commit("repository has no commits to inherit an author from"))?;

        self.vcs
            .commit(dir, ctx.commit_message(), &author)
            .await
            .map_err(|e| Error::Commit {
                message: "git refused the commit".to_string(),
                source: Some(Box::new(e)),
            })?;
        debug!(author = %author.name, "Committed as inherited author");
        Ok(())
    }

    /// Push the branch under the same name.
    ///
    /// The remote branch is recorded before the attempt: a push that fails
    /// late may still have created it, and deleting a missing branch is harmless.
    pub async fn push(&self, ctx: &mut LifecycleContext) -> Result<()> {
        ctx.record(Artifact::RemoteBranch);
        let dir = Self::workdir(ctx)?;
        let branch = ctx.branch();
        self.vcs
            .push(dir, &self.remote, branch.as_str(), branch.as_str())
            .await
            .map_err(|e| Error::Push {
                branch: branch.to_string(),
                source: Box::new(e),
            })?;
        info!(branch = %branch, remote = %self.remote, "Pushed branch");
        Ok(())
    }
}

fn injection_error(
    path: &Path,
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    Error::Injection {
        path: path.to_path_buf(),
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}
