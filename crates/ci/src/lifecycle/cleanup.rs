//! Reversal of whatever a run created.
//!
//! Cleanup never fails: every step that goes wrong becomes a
//! [`CleanupWarning`] and the artifact stays in the ledger, so the caller can
//! see exactly what was left behind. Reversed artifacts leave the ledger,
//! which makes a second pass over the same context a no-op.

use super::context::{Artifact, LifecycleContext};
use miette::Diagnostic;
use pipeprobe_core::{PlatformClient, Result, RunId};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How much of a run to erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupMode {
    /// Delete run, logs, remote branch and working directory
    Full,
    /// Erase logs only; branch and run stay visible
    LogsOnly,
}

/// A single cleanup action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStep {
    /// Cancelling an unfinished run
    CancelRun,
    /// Deleting the run
    DeleteRun,
    /// Erasing the run's logs
    DeleteLogs,
    /// Deleting the remote branch
    DeleteBranch,
    /// Removing the local working directory
    RemoveWorkdir,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CancelRun => "cancel run",
            Self::DeleteRun => "delete run",
            Self::DeleteLogs => "delete logs",
            Self::DeleteBranch => "delete branch",
            Self::RemoveWorkdir => "remove working directory",
        };
        f.write_str(s)
    }
}

/// A cleanup step that did not succeed.
#[derive(Error, Debug, Clone, Diagnostic, Serialize)]
#[error("Cleanup step '{step}' failed: {message}")]
#[diagnostic(
    code(pipeprobe::cleanup),
    help("The artifact may still exist on the platform and need manual removal")
)]
pub struct CleanupWarning {
    /// The step that failed
    pub step: CleanupStep,
    /// What went wrong
    pub message: String,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    /// Mode the pass ran in
    pub mode: CleanupMode,
    /// Non-fatal failures, in the order they happened
    pub warnings: Vec<CleanupWarning>,
    /// Artifacts left in place on purpose (e.g. runs that cannot be deleted)
    pub retained: Vec<Artifact>,
    /// Artifacts that still exist after the pass, retained ones included
    pub remaining: Vec<Artifact>,
}

impl CleanupReport {
    /// Whether every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs the platform calls that undo a run, each under its own timeout.
pub struct CleanupCoordinator {
    platform: Arc<dyn PlatformClient>,
    call_timeout: Duration,
    settle_interval: Duration,
}

impl CleanupCoordinator {
    /// Create a coordinator whose platform calls are bounded by `call_timeout`.
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformClient>, call_timeout: Duration) -> Self {
        Self {
            platform,
            call_timeout,
            settle_interval: Duration::from_secs(2),
        }
    }

    /// Delay between status checks while a cancelled run winds down.
    #[must_use]
    pub const fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Undo what the context records, according to `mode`.
    pub async fn cleanup(&self, ctx: &mut LifecycleContext, mode: CleanupMode) -> CleanupReport {
        let mut warnings = Vec::new();
        debug!(?mode, artifacts = ?ctx.created_artifacts(), "Starting cleanup");

        match mode {
            CleanupMode::Full => self.full(ctx, &mut warnings).await,
            CleanupMode::LogsOnly => self.logs_only(ctx, &mut warnings).await,
        }
        remove_workdir(ctx, &mut warnings);

        let report = CleanupReport {
            mode,
            warnings,
            retained: ctx
                .remaining_artifacts()
                .into_iter()
                .filter(|a| !ctx.has(*a))
                .collect(),
            remaining: ctx.remaining_artifacts(),
        };
        if report.is_clean() {
            info!(?mode, remaining = ?report.remaining, "Cleanup finished");
        } else {
            warn!(
                ?mode,
                warnings = report.warnings.len(),
                remaining = ?report.remaining,
                "Cleanup finished with warnings"
            );
        }
        report
    }

    async fn full(&self, ctx: &mut LifecycleContext, warnings: &mut Vec<CleanupWarning>) {
        if ctx.has(Artifact::Run)
            && let Some(run) = ctx.run_id()
        {
            if !ctx.run_status().is_some_and(|s| s.is_terminal()) {
                let cancelled = self
                    .step(CleanupStep::CancelRun, self.platform.cancel_run(ctx.target(), run))
                    .await;
                match cancelled {
                    Ok(()) => self.await_cancellation(ctx, run).await,
                    Err(warning) => warnings.push(warning),
                }
            }

            if self.platform.supports_run_deletion() {
                let deleted = self
                    .step(CleanupStep::DeleteRun, self.platform.delete_run(ctx.target(), run))
                    .await;
                match deleted {
                    Ok(()) => {
                        ctx.forget(Artifact::Run);
                        ctx.forget(Artifact::Logs);
                    }
                    Err(warning) => {
                        warnings.push(warning);
                        // The run stays behind; its logs must not.
                        self.erase_logs(ctx, run, warnings).await;
                    }
                }
            } else {
                debug!(platform = self.platform.name(), "Run deletion unsupported; erasing logs");
                if self.erase_logs(ctx, run, warnings).await {
                    ctx.retain_artifact(Artifact::Run);
                }
            }
        }

        if ctx.has(Artifact::RemoteBranch) {
            let deleted = self
                .step(
                    CleanupStep::DeleteBranch,
                    self.platform.delete_branch(ctx.target(), ctx.branch()),
                )
                .await;
            match deleted {
                Ok(()) => ctx.forget(Artifact::RemoteBranch),
                Err(warning) => warnings.push(warning),
            }
        }
    }

    async fn logs_only(&self, ctx: &mut LifecycleContext, warnings: &mut Vec<CleanupWarning>) {
        if ctx.has(Artifact::Run)
            && let Some(run) = ctx.run_id()
        {
            self.erase_logs(ctx, run, warnings).await;
        }
    }

    /// Poll a cancelled run until it stops, for at most one call budget.
    ///
    /// Platforms refuse to delete a run that is still shutting down. A run
    /// that does not settle in time is deleted anyway and may be left behind.
    async fn await_cancellation(&self, ctx: &mut LifecycleContext, run: RunId) {
        let target = ctx.target();
        let settled = tokio::time::timeout(self.call_timeout, async {
            loop {
                match self.platform.get_run_status(target, run).await {
                    Ok(status) if status.is_terminal() => return Some(status),
                    Ok(status) => debug!(run = %run, %status, "Waiting for cancellation"),
                    Err(e) => {
                        debug!(run = %run, error = %e, "Status unavailable after cancel");
                        return None;
                    }
                }
                tokio::time::sleep(self.settle_interval).await;
            }
        })
        .await;

        match settled {
            Ok(Some(status)) => {
                debug!(run = %run, %status, "Run stopped");
                ctx.set_run_status(status);
            }
            Ok(None) => {}
            Err(_) => warn!(run = %run, "Run still stopping after cancel; deleting anyway"),
        }
    }

    /// Erase logs once per context; returns whether they are gone.
    async fn erase_logs(
        &self,
        ctx: &mut LifecycleContext,
        run: RunId,
        warnings: &mut Vec<CleanupWarning>,
    ) -> bool {
        if ctx.logs_erased() {
            return true;
        }
        let erased = self
            .step(CleanupStep::DeleteLogs, self.platform.delete_logs(ctx.target(), run))
            .await;
        match erased {
            Ok(()) => {
                ctx.mark_logs_erased();
                true
            }
            Err(warning) => {
                warnings.push(warning);
                false
            }
        }
    }

    async fn step<F>(&self, step: CleanupStep, call: F) -> std::result::Result<(), CleanupWarning>
    where
        F: Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(())) => {
                debug!(%step, "Cleanup step done");
                Ok(())
            }
            Ok(Err(e)) => Err(CleanupWarning {
                step,
                message: e.to_string(),
            }),
            Err(_) => Err(CleanupWarning {
                step,
                message: format!("timed out after {}s", self.call_timeout.as_secs()),
            }),
        }
    }
}

fn remove_workdir(ctx: &mut LifecycleContext, warnings: &mut Vec<CleanupWarning>) {
    let Some(dir) = ctx.take_workdir() else {
        return;
    };
    let path = dir.path().display().to_string();
    match dir.close() {
        Ok(()) => {
            debug!(%path, "Removed working directory");
            ctx.forget(Artifact::LocalBranch);
        }
        Err(e) => warnings.push(CleanupWarning {
            step: CleanupStep::RemoveWorkdir,
            message: format!("{path}: {e}"),
        }),
    }
}
