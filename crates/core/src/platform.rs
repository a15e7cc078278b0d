//! The platform capability interface implemented by each backend.

use crate::error::Result;
use crate::identity::{Identity, TargetRecord};
use crate::run::{LogBundle, RunId, RunStatus};
use crate::target::{BranchName, TargetRef};
use async_trait::async_trait;
use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// Authenticated client for one hosting platform.
///
/// The orchestrator and recon analyzer only ever see `dyn PlatformClient`;
/// everything platform specific (endpoints, pipeline file location, status
/// vocabulary, clone URL shape) lives behind this trait.
///
/// Implementations must treat any HTTP status other than 200, 201 and 204 as
/// a failed call.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Short platform name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Username that is treated as an administrator regardless of flags.
    fn superuser_name(&self) -> Option<&str> {
        None
    }

    /// Where the pipeline definition must live inside the working tree.
    fn pipeline_path(&self, source: &Path) -> PathBuf;

    /// Authenticated clone URL for a target.
    fn clone_url(&self, target: &TargetRef) -> SecretString;

    /// Whether runs can be deleted outright (rather than only having logs erased).
    fn supports_run_deletion(&self) -> bool {
        true
    }

    /// Resolve the account behind the token.
    async fn get_identity(&self) -> Result<Identity>;

    /// List targets; with `show_all` the listing is not restricted to memberships.
    async fn list_accessible_targets(&self, show_all: bool) -> Result<Vec<TargetRecord>>;

    /// Start (or locate the push-started) run for a branch.
    ///
    /// `pipeline` is the injected definition's path inside the tree, as
    /// returned by [`pipeline_path`](Self::pipeline_path). Platforms that start
    /// one run per definition must return the run of that definition.
    async fn trigger_run(
        &self,
        target: &TargetRef,
        branch: &BranchName,
        pipeline: &Path,
    ) -> Result<RunId>;

    /// Current platform-reported status.
    async fn get_run_status(&self, target: &TargetRef, run: RunId) -> Result<RunStatus>;

    /// Retrieve the logs of every job of a run.
    async fn get_run_logs(&self, target: &TargetRef, run: RunId) -> Result<LogBundle>;

    /// Request cancellation of a run that has not finished.
    async fn cancel_run(&self, target: &TargetRef, run: RunId) -> Result<()>;

    /// Delete a run and everything attached to it.
    async fn delete_run(&self, target: &TargetRef, run: RunId) -> Result<()>;

    /// Erase the logs of a run, leaving the run itself visible.
    async fn delete_logs(&self, target: &TargetRef, run: RunId) -> Result<()>;

    /// Delete a branch on the remote.
    async fn delete_branch(&self, target: &TargetRef, branch: &BranchName) -> Result<()>;
}
