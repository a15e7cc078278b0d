//! Recording fakes of the platform and VCS collaborators.
//!
//! Both fakes append to a shared [`CallLog`] so tests can assert on the exact
//! order of collaborator calls across the two seams.

#![allow(clippy::missing_panics_doc)]

use crate::error::{Error, Result};
use crate::identity::{Identity, TargetRecord};
use crate::platform::PlatformClient;
use crate::run::{LogBundle, RunId, RunStatus};
use crate::target::{BranchName, TargetRef};
use crate::vcs::{CommitAuthor, VcsClient};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Run id handed out by [`RecordingPlatform::trigger_run`].
pub const FAKE_RUN_ID: RunId = RunId(4242);

/// Pipeline location used by [`RecordingPlatform`].
pub const FAKE_PIPELINE_PATH: &str = ".ci/pipeline.yml";

/// One collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `VcsClient::clone_repo`
    Clone,
    /// `VcsClient::create_and_checkout_branch`
    CreateBranch(String),
    /// `VcsClient::stage_file`
    Stage(PathBuf),
    /// `VcsClient::commit`
    Commit {
        /// Commit message
        message: String,
        /// Author and committer
        author: CommitAuthor,
    },
    /// `VcsClient::push`
    Push {
        /// Remote name
        remote: String,
        /// Local ref
        local_ref: String,
        /// Remote ref
        remote_ref: String,
    },
    /// `PlatformClient::get_identity`
    Identity,
    /// `PlatformClient::list_accessible_targets`
    ListTargets {
        /// The flag passed through
        show_all: bool,
    },
    /// `PlatformClient::trigger_run`
    Trigger(String),
    /// `PlatformClient::get_run_status`
    Poll(RunId),
    /// `PlatformClient::get_run_logs`
    CollectLogs(RunId),
    /// `PlatformClient::cancel_run`
    CancelRun(RunId),
    /// `PlatformClient::delete_run`
    DeleteRun(RunId),
    /// `PlatformClient::delete_logs`
    DeleteLogs(RunId),
    /// `PlatformClient::delete_branch`
    DeleteBranch(String),
}

impl Call {
    /// Short name for sequence assertions.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::CreateBranch(_) => "branch",
            Self::Stage(_) => "stage",
            Self::Commit { .. } => "commit",
            Self::Push { .. } => "push",
            Self::Identity => "identity",
            Self::ListTargets { .. } => "list",
            Self::Trigger(_) => "trigger",
            Self::Poll(_) => "poll",
            Self::CollectLogs(_) => "collectLogs",
            Self::CancelRun(_) => "cancelRun",
            Self::DeleteRun(_) => "deleteRun",
            Self::DeleteLogs(_) => "deleteLogs",
            Self::DeleteBranch(_) => "deleteBranch",
        }
    }
}

/// Operations that can be told to fail or hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Clone
    Clone,
    /// Branch creation
    Branch,
    /// Staging
    Stage,
    /// Commit
    Commit,
    /// Push
    Push,
    /// Identity lookup
    Identity,
    /// Target listing
    ListTargets,
    /// Trigger
    Trigger,
    /// Status polling
    Status,
    /// Log retrieval
    Logs,
    /// Run cancellation
    Cancel,
    /// Run deletion
    DeleteRun,
    /// Log deletion
    DeleteLogs,
    /// Branch deletion
    DeleteBranch,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        lock(&self.0).push(call);
    }

    /// Copy of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.0).clone()
    }

    /// Recorded call names with consecutive polls collapsed into one `poll*`.
    #[must_use]
    pub fn sequence(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for call in lock(&self.0).iter() {
            let name = match call.name() {
                "poll" => "poll*",
                other => other,
            };
            if name == "poll*" && out.last() == Some(&"poll*") {
                continue;
            }
            out.push(name);
        }
        out
    }

    /// Number of calls with the given name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        lock(&self.0).iter().filter(|c| c.name() == name).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

#[derive(Debug, Default)]
struct Behaviour {
    failing: HashSet<Op>,
    hanging: HashSet<Op>,
}

impl Behaviour {
    async fn check(&self, op: Op, what: &str) -> Result<()> {
        if self.hanging.contains(&op) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&op) {
            return Err(Error::api("fake", Some(500), format!("simulated {what} failure")));
        }
        Ok(())
    }

    fn check_git(&self, op: Op, command: &str) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(Error::git(command, "simulated failure"));
        }
        Ok(())
    }
}

/// [`VcsClient`] that records calls and works on the real directory it is given.
#[derive(Debug)]
pub struct RecordingVcs {
    log: CallLog,
    behaviour: Behaviour,
    author: Option<CommitAuthor>,
    staged: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingVcs {
    /// Fake whose repository has one commit by `Alice <alice@x.com>`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            behaviour: Behaviour::default(),
            author: Some(CommitAuthor::new("Alice", "alice@x.com")),
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Replace the author of the (single) existing commit; `None` for an empty repository.
    #[must_use]
    pub fn with_last_author(mut self, author: Option<CommitAuthor>) -> Self {
        self.author = author;
        self
    }

    /// Make an operation fail.
    #[must_use]
    pub fn failing(mut self, op: Op) -> Self {
        self.behaviour.failing.insert(op);
        self
    }

    /// Path and content of every staged file.
    #[must_use]
    pub fn staged(&self) -> Vec<(PathBuf, String)> {
        lock(&self.staged).clone()
    }
}

#[async_trait]
impl VcsClient for RecordingVcs {
    async fn clone_repo(&self, _remote_url: &SecretString, dir: &Path) -> Result<()> {
        self.log.record(Call::Clone);
        self.behaviour.check_git(Op::Clone, "clone")?;
        std::fs::write(dir.join("README.md"), "fake repository\n")
            .map_err(|e| Error::io("write", Some(dir.to_path_buf()), e))
    }

    async fn create_and_checkout_branch(&self, _dir: &Path, name: &BranchName) -> Result<()> {
        self.log.record(Call::CreateBranch(name.to_string()));
        self.behaviour.check_git(Op::Branch, "checkout")
    }

    async fn stage_file(&self, dir: &Path, path: &Path) -> Result<()> {
        self.log.record(Call::Stage(path.to_path_buf()));
        self.behaviour.check_git(Op::Stage, "add")?;
        let content = std::fs::read_to_string(dir.join(path))
            .map_err(|e| Error::git("add", format!("pathspec did not match: {e}")))?;
        lock(&self.staged).push((path.to_path_buf(), content));
        Ok(())
    }

    async fn commit(&self, _dir: &Path, message: &str, author: &CommitAuthor) -> Result<()> {
        self.log.record(Call::Commit {
            message: message.to_string(),
            author: author.clone(),
        });
        self.behaviour.check_git(Op::Commit, "commit")
    }

    async fn push(&self, _dir: &Path, remote: &str, local_ref: &str, remote_ref: &str) -> Result<()> {
        self.log.record(Call::Push {
            remote: remote.to_string(),
            local_ref: local_ref.to_string(),
            remote_ref: remote_ref.to_string(),
        });
        self.behaviour.check_git(Op::Push, "push")
    }

    async fn last_commit_author(&self, _dir: &Path) -> Result<Option<CommitAuthor>> {
        Ok(self.author.clone())
    }
}

/// [`PlatformClient`] that records calls and replays scripted run statuses.
#[derive(Debug)]
pub struct RecordingPlatform {
    log: CallLog,
    behaviour: Behaviour,
    statuses: Mutex<VecDeque<RunStatus>>,
    logs: LogBundle,
    identity: Identity,
    targets: Vec<TargetRecord>,
    superuser: Option<String>,
    run_deletion: bool,
}

impl RecordingPlatform {
    /// Fake whose runs go `Pending → Running → Succeeded`.
    ///
    /// A successful cancellation makes every later poll report `Canceled`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        let mut logs = LogBundle::default();
        logs.push("build", "Hello from the injected pipeline\n");
        Self {
            log,
            behaviour: Behaviour::default(),
            statuses: Mutex::new(VecDeque::from([
                RunStatus::Pending,
                RunStatus::Running,
                RunStatus::Succeeded,
            ])),
            logs,
            identity: Identity {
                username: "operator".to_string(),
                display_name: Some("Operator".to_string()),
                id: 7,
                email: None,
                is_admin_flag: false,
            },
            targets: Vec::new(),
            superuser: None,
            run_deletion: true,
        }
    }

    /// Script the statuses returned by successive polls; the last one repeats.
    #[must_use]
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        *lock(&self.statuses) = statuses.into_iter().collect();
        self
    }

    /// Replace the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the listed targets.
    #[must_use]
    pub fn with_targets(mut self, targets: Vec<TargetRecord>) -> Self {
        self.targets = targets;
        self
    }

    /// Set the superuser name.
    #[must_use]
    pub fn with_superuser(mut self, name: impl Into<String>) -> Self {
        self.superuser = Some(name.into());
        self
    }

    /// Declare whether runs can be deleted.
    #[must_use]
    pub const fn with_run_deletion(mut self, supported: bool) -> Self {
        self.run_deletion = supported;
        self
    }

    /// Make an operation fail with a 500.
    #[must_use]
    pub fn failing(mut self, op: Op) -> Self {
        self.behaviour.failing.insert(op);
        self
    }

    /// Make an operation never complete.
    #[must_use]
    pub fn hanging(mut self, op: Op) -> Self {
        self.behaviour.hanging.insert(op);
        self
    }

    /// Stop failing an operation.
    pub fn recover(&mut self, op: Op) {
        self.behaviour.failing.remove(&op);
    }
}

#[async_trait]
impl PlatformClient for RecordingPlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn superuser_name(&self) -> Option<&str> {
        self.superuser.as_deref()
    }

    fn pipeline_path(&self, _source: &Path) -> PathBuf {
        PathBuf::from(FAKE_PIPELINE_PATH)
    }

    fn clone_url(&self, target: &TargetRef) -> SecretString {
        SecretString::from(format!("https://token@example.invalid/{target}.git"))
    }

    fn supports_run_deletion(&self) -> bool {
        self.run_deletion
    }

    async fn get_identity(&self) -> Result<Identity> {
        self.log.record(Call::Identity);
        self.behaviour.check(Op::Identity, "identity").await?;
        Ok(self.identity.clone())
    }

    async fn list_accessible_targets(&self, show_all: bool) -> Result<Vec<TargetRecord>> {
        self.log.record(Call::ListTargets { show_all });
        self.behaviour.check(Op::ListTargets, "listing").await?;
        Ok(self.targets.clone())
    }

    async fn trigger_run(
        &self,
        _target: &TargetRef,
        branch: &BranchName,
        _pipeline: &Path,
    ) -> Result<RunId> {
        self.log.record(Call::Trigger(branch.to_string()));
        self.behaviour.check(Op::Trigger, "trigger").await?;
        Ok(FAKE_RUN_ID)
    }

    async fn get_run_status(&self, _target: &TargetRef, run: RunId) -> Result<RunStatus> {
        self.log.record(Call::Poll(run));
        self.behaviour.check(Op::Status, "status").await?;
        let mut statuses = lock(&self.statuses);
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(RunStatus::Succeeded))
    }

    async fn get_run_logs(&self, _target: &TargetRef, run: RunId) -> Result<LogBundle> {
        self.log.record(Call::CollectLogs(run));
        self.behaviour.check(Op::Logs, "logs").await?;
        Ok(self.logs.clone())
    }

    async fn cancel_run(&self, _target: &TargetRef, run: RunId) -> Result<()> {
        self.log.record(Call::CancelRun(run));
        self.behaviour.check(Op::Cancel, "cancel").await?;
        *lock(&self.statuses) = VecDeque::from([RunStatus::Canceled]);
        Ok(())
    }

    async fn delete_run(&self, _target: &TargetRef, run: RunId) -> Result<()> {
        self.log.record(Call::DeleteRun(run));
        self.behaviour.check(Op::DeleteRun, "run deletion").await
    }

    async fn delete_logs(&self, _target: &TargetRef, run: RunId) -> Result<()> {
        self.log.record(Call::DeleteLogs(run));
        self.behaviour.check(Op::DeleteLogs, "log deletion").await
    }

    async fn delete_branch(&self, _target: &TargetRef, branch: &BranchName) -> Result<()> {
        self.log.record(Call::DeleteBranch(branch.to_string()));
        self.behaviour.check(Op::DeleteBranch, "branch deletion").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_collapses_polls() {
        let log = CallLog::new();
        log.record(Call::Trigger("b".into()));
        log.record(Call::Poll(FAKE_RUN_ID));
        log.record(Call::Poll(FAKE_RUN_ID));
        log.record(Call::CollectLogs(FAKE_RUN_ID));
        assert_eq!(log.sequence(), vec!["trigger", "poll*", "collectLogs"]);
        assert_eq!(log.count("poll"), 2);
    }

    #[tokio::test]
    async fn test_scripted_statuses_repeat_last() {
        let platform = RecordingPlatform::new(CallLog::new())
            .with_statuses([RunStatus::Running, RunStatus::Failed]);
        let target = TargetRef::parse("org/repo").unwrap();
        assert_eq!(
            platform.get_run_status(&target, FAKE_RUN_ID).await.unwrap(),
            RunStatus::Running
        );
        for _ in 0..3 {
            assert_eq!(
                platform.get_run_status(&target, FAKE_RUN_ID).await.unwrap(),
                RunStatus::Failed
            );
        }
    }
}
