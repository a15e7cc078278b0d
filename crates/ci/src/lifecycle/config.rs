//! Lifecycle configuration and per-run requests.

use pipeprobe_core::{BranchName, TargetRef};
use std::path::PathBuf;
use std::time::Duration;

/// Remote the injected branch is pushed to.
pub const DEFAULT_REMOTE: &str = "origin";

/// Commit message used when the caller does not provide one.
pub const DEFAULT_COMMIT_MESSAGE: &str = "testing out new linter workflow";

/// Timing and transport settings shared by every run of an orchestrator.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Delay between two status polls.
    pub poll_interval: Duration,
    /// Upper bound on polling before giving up with a poll timeout.
    pub poll_timeout: Duration,
    /// Overall deadline for the forward path (clone through log collection).
    pub run_deadline: Option<Duration>,
    /// Budget for each individual cleanup call.
    pub cleanup_call_timeout: Duration,
    /// Remote name to push to.
    pub remote: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(10 * 60),
            run_deadline: Some(Duration::from_secs(20 * 60)),
            cleanup_call_timeout: Duration::from_secs(30),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Set the polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the polling timeout.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set (or clear) the overall run deadline.
    #[must_use]
    pub const fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Set the per-call cleanup budget.
    #[must_use]
    pub const fn with_cleanup_call_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_call_timeout = timeout;
        self
    }
}

/// One pipeline injection against one target.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Target repository
    pub target: TargetRef,
    /// Local pipeline definition to inject
    pub pipeline_file: PathBuf,
    /// Branch carrying the injected commit
    pub branch: BranchName,
    /// Message of the injected commit
    pub commit_message: String,
    /// Erase logs only, leaving branch and run visible
    pub only_delete_logs: bool,
}

impl RunRequest {
    /// Request with a random branch name and the default commit message.
    #[must_use]
    pub fn new(target: TargetRef, pipeline_file: impl Into<PathBuf>) -> Self {
        Self {
            target,
            pipeline_file: pipeline_file.into(),
            branch: BranchName::default(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            only_delete_logs: false,
        }
    }

    /// Use an explicit branch name.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchName) -> Self {
        self.branch = branch;
        self
    }

    /// Use an explicit commit message.
    #[must_use]
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Only erase logs during cleanup.
    #[must_use]
    pub const fn with_only_delete_logs(mut self, only_delete_logs: bool) -> Self {
        self.only_delete_logs = only_delete_logs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeprobe_core::target::DEFAULT_BRANCH_PREFIX;

    #[test]
    fn test_request_defaults() {
        let request = RunRequest::new(TargetRef::parse("org/repo").unwrap(), "mal.yaml");
        assert!(request.branch.as_str().starts_with(DEFAULT_BRANCH_PREFIX));
        assert_eq!(request.commit_message, DEFAULT_COMMIT_MESSAGE);
        assert!(!request.only_delete_logs);
    }

    #[test]
    fn test_config_builder() {
        let config = LifecycleConfig::default()
            .with_poll_interval(Duration::from_secs(1))
            .with_poll_timeout(Duration::from_secs(9))
            .with_run_deadline(None);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.poll_timeout, Duration::from_secs(9));
        assert!(config.run_deadline.is_none());
        assert_eq!(config.remote, DEFAULT_REMOTE);
    }
}
