//! Per-run lifecycle state and the artifact ledger.

use super::config::RunRequest;
use pipeprobe_core::{BranchName, LogBundle, RunId, RunStatus, TargetRef};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    /// Nothing done yet
    Init,
    /// Repository cloned into the working directory
    Cloned,
    /// Branch created and checked out
    Branched,
    /// Pipeline file written and staged
    Injected,
    /// Branch pushed to the remote
    Pushed,
    /// Run started
    Triggered,
    /// Polling the run
    Monitoring,
    /// Logs retrieved
    Collected,
    /// Full cleanup done
    CleanedUp,
    /// Log-only cleanup done
    LogsOnlyCleanup,
    /// A forward step failed
    Failed,
}

impl LifecycleState {
    const fn ordinal(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Cloned => 1,
            Self::Branched => 2,
            Self::Injected => 3,
            Self::Pushed => 4,
            Self::Triggered => 5,
            Self::Monitoring => 6,
            Self::Collected => 7,
            Self::CleanedUp | Self::LogsOnlyCleanup => 8,
            Self::Failed => u8::MAX,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CleanedUp | Self::LogsOnlyCleanup | Self::Failed)
    }

    /// Forward transitions go one step at a time; `Failed` is reachable from
    /// any non-terminal state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            _ => next.ordinal() == self.ordinal() + 1,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Cloned => "cloned",
            Self::Branched => "branched",
            Self::Injected => "injected",
            Self::Pushed => "pushed",
            Self::Triggered => "triggered",
            Self::Monitoring => "monitoring",
            Self::Collected => "collected",
            Self::CleanedUp => "cleaned-up",
            Self::LogsOnlyCleanup => "logs-only-cleanup",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A side effect that cleanup may have to reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Artifact {
    /// Branch in the local clone; goes away with the working directory
    LocalBranch,
    /// Branch on the remote
    RemoteBranch,
    /// Triggered run
    Run,
    /// Logs of the run
    Logs,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalBranch => "branch",
            Self::RemoteBranch => "branch-pushed",
            Self::Run => "run",
            Self::Logs => "logs",
        };
        f.write_str(s)
    }
}

/// Mutable record of one run, owned exclusively by its orchestrator call.
#[derive(Debug)]
pub struct LifecycleContext {
    target: TargetRef,
    branch: BranchName,
    commit_message: String,
    pipeline_file: PathBuf,
    pipeline_path: PathBuf,
    workdir: Option<TempDir>,
    workdir_path: Option<PathBuf>,
    run_id: Option<RunId>,
    run_status: Option<RunStatus>,
    logs: Option<LogBundle>,
    state: LifecycleState,
    created: BTreeSet<Artifact>,
    retained: BTreeSet<Artifact>,
    logs_erased: bool,
}

impl LifecycleContext {
    /// Fresh context for a request; `pipeline_path` is where the file goes in the tree.
    #[must_use]
    pub fn new(request: &RunRequest, pipeline_path: PathBuf) -> Self {
        Self {
            target: request.target.clone(),
            branch: request.branch.clone(),
            commit_message: request.commit_message.clone(),
            pipeline_file: request.pipeline_file.clone(),
            pipeline_path,
            workdir: None,
            workdir_path: None,
            run_id: None,
            run_status: None,
            logs: None,
            state: LifecycleState::Init,
            created: BTreeSet::new(),
            retained: BTreeSet::new(),
            logs_erased: false,
        }
    }

    /// Target repository.
    #[must_use]
    pub const fn target(&self) -> &TargetRef {
        &self.target
    }

    /// Injected branch.
    #[must_use]
    pub const fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Message of the injected commit.
    #[must_use]
    pub fn commit_message(&self) -> &str {
        &self.commit_message
    }

    /// Caller-supplied pipeline definition.
    #[must_use]
    pub fn pipeline_file(&self) -> &Path {
        &self.pipeline_file
    }

    /// Destination of the pipeline definition, relative to the working tree.
    #[must_use]
    pub fn pipeline_path(&self) -> &Path {
        &self.pipeline_path
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move forward to `next`; invalid transitions are ignored and logged.
    pub fn advance(&mut self, next: LifecycleState) {
        if self.state.can_advance_to(next) {
            debug!(from = %self.state, to = %next, "Lifecycle transition");
            self.state = next;
        } else {
            tracing::error!(from = %self.state, to = %next, "Rejected lifecycle transition");
        }
    }

    /// Enter the terminal failed state.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = LifecycleState::Failed;
        }
    }

    /// Record a created artifact.
    pub fn record(&mut self, artifact: Artifact) {
        if self.created.insert(artifact) {
            debug!(%artifact, "Recorded artifact");
        }
    }

    /// Drop an artifact from the ledger after it was reversed.
    pub(crate) fn forget(&mut self, artifact: Artifact) {
        self.created.remove(&artifact);
    }

    /// Move an artifact that cleanup deliberately leaves in place to the retained set.
    pub(crate) fn retain_artifact(&mut self, artifact: Artifact) {
        if self.created.remove(&artifact) {
            self.retained.insert(artifact);
        }
    }

    /// Whether an artifact is still recorded as created.
    #[must_use]
    pub fn has(&self, artifact: Artifact) -> bool {
        self.created.contains(&artifact)
    }

    /// Artifacts created and not yet reversed.
    #[must_use]
    pub const fn created_artifacts(&self) -> &BTreeSet<Artifact> {
        &self.created
    }

    /// Everything that still exists: unreversed plus deliberately retained artifacts.
    #[must_use]
    pub fn remaining_artifacts(&self) -> Vec<Artifact> {
        self.created.union(&self.retained).copied().collect()
    }

    /// Take ownership of the working directory.
    pub fn set_workdir(&mut self, dir: TempDir) {
        self.workdir_path = Some(dir.path().to_path_buf());
        self.workdir = Some(dir);
    }

    /// The working directory, while it exists.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }

    /// Path the working directory had, even after removal.
    #[must_use]
    pub fn workdir_path(&self) -> Option<&Path> {
        self.workdir_path.as_deref()
    }

    pub(crate) fn take_workdir(&mut self) -> Option<TempDir> {
        self.workdir.take()
    }

    /// Store the id of the triggered run.
    pub fn set_run(&mut self, id: RunId) {
        self.run_id = Some(id);
    }

    /// Id of the triggered run.
    #[must_use]
    pub const fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Store the last polled status.
    pub fn set_run_status(&mut self, status: RunStatus) {
        self.run_status = Some(status);
    }

    /// Last polled status.
    #[must_use]
    pub const fn run_status(&self) -> Option<RunStatus> {
        self.run_status
    }

    /// Store collected logs.
    pub fn set_logs(&mut self, logs: LogBundle) {
        self.logs = Some(logs);
    }

    /// Collected logs.
    #[must_use]
    pub const fn logs(&self) -> Option<&LogBundle> {
        self.logs.as_ref()
    }

    pub(crate) fn take_logs(&mut self) -> Option<LogBundle> {
        self.logs.take()
    }

    pub(crate) const fn logs_erased(&self) -> bool {
        self.logs_erased
    }

    pub(crate) fn mark_logs_erased(&mut self) {
        self.logs_erased = true;
        self.created.remove(&Artifact::Logs);
    }
}
