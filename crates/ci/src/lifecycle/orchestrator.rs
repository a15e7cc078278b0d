//! Sequencing of a whole run: forward steps, then cleanup no matter what.

use super::cleanup::{CleanupCoordinator, CleanupMode, CleanupReport};
use super::config::{LifecycleConfig, RunRequest};
use super::context::{Artifact, LifecycleContext, LifecycleState};
use super::deadline::Deadline;
use super::monitor::RunMonitor;
use super::staging::RepoStaging;
use miette::Diagnostic;
use pipeprobe_core::{
    BranchName, Error, LogBundle, PlatformClient, Result, RunId, RunStatus, TargetRef, VcsClient,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span};

/// Result of a run whose forward path completed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Target repository
    pub target: TargetRef,
    /// Injected branch
    pub branch: BranchName,
    /// Where the pipeline file was placed
    pub pipeline_path: PathBuf,
    /// Local working directory used for the clone (removed by cleanup)
    pub workdir: Option<PathBuf>,
    /// The triggered run
    pub run_id: RunId,
    /// Terminal status of the run
    pub status: RunStatus,
    /// Collected logs
    pub logs: LogBundle,
    /// What cleanup did
    pub cleanup: CleanupReport,
    /// Final lifecycle state
    pub final_state: LifecycleState,
}

/// A run whose forward path failed; cleanup has already been attempted.
#[derive(Error, Debug, Diagnostic)]
#[error("Pipeline run against {target} failed after reaching '{failed_after}'")]
pub struct RunFailure {
    /// Target repository
    pub target: TargetRef,
    /// Injected branch
    pub branch: BranchName,
    /// Last state reached before the failure
    pub failed_after: LifecycleState,
    /// The step error
    #[source]
    #[diagnostic_source]
    pub error: Error,
    /// Local working directory used for the clone (removed by cleanup)
    pub workdir: Option<PathBuf>,
    /// The run, if one was triggered
    pub run_id: Option<RunId>,
    /// Last status seen for the run
    pub last_status: Option<RunStatus>,
    /// What cleanup did
    pub cleanup: CleanupReport,
}

impl RunFailure {
    /// Artifacts that outlived cleanup.
    #[must_use]
    pub fn remaining_artifacts(&self) -> &[Artifact] {
        &self.cleanup.remaining
    }
}

/// Drives one pipeline injection from clone to cleanup.
///
/// The orchestrator is stateless between runs; each [`run`](Self::run) call
/// owns its own [`LifecycleContext`], so independent runs may proceed
/// concurrently against the same collaborators.
pub struct LifecycleOrchestrator {
    platform: Arc<dyn PlatformClient>,
    staging: RepoStaging,
    monitor: RunMonitor,
    cleanup: CleanupCoordinator,
    config: LifecycleConfig,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator over a platform and a VCS client.
    #[must_use]
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        vcs: Arc<dyn VcsClient>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            staging: RepoStaging::new(vcs, config.remote.clone()),
            monitor: RunMonitor::new(
                Arc::clone(&platform),
                config.poll_interval,
                config.poll_timeout,
            ),
            cleanup: CleanupCoordinator::new(Arc::clone(&platform), config.cleanup_call_timeout)
                .with_settle_interval(config.poll_interval),
            platform,
            config,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Execute a run.
    ///
    /// Cleanup is always attempted before returning. Its problems never
    /// replace the step error; they are reported in the [`CleanupReport`].
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the first forward-step error.
    pub async fn run(&self, request: RunRequest) -> std::result::Result<RunSummary, RunFailure> {
        let span = info_span!(
            "lifecycle",
            platform = self.platform.name(),
            target = %request.target,
            branch = %request.branch,
        );
        async move {
            let pipeline_path = self.platform.pipeline_path(&request.pipeline_file);
            let mut ctx = LifecycleContext::new(&request, pipeline_path);
            let mode = if request.only_delete_logs {
                CleanupMode::LogsOnly
            } else {
                CleanupMode::Full
            };

            match self.forward(&mut ctx).await {
                Ok((run_id, status)) => {
                    let report = self.cleanup.cleanup(&mut ctx, mode).await;
                    ctx.advance(match mode {
                        CleanupMode::Full => LifecycleState::CleanedUp,
                        CleanupMode::LogsOnly => LifecycleState::LogsOnlyCleanup,
                    });
                    info!(run = %run_id, %status, state = %ctx.state(), "Run complete");
                    Ok(RunSummary {
                        target: request.target,
                        branch: request.branch,
                        pipeline_path: ctx.pipeline_path().to_path_buf(),
                        workdir: ctx.workdir_path().map(PathBuf::from),
                        run_id,
                        status,
                        logs: ctx.take_logs().unwrap_or_default(),
                        cleanup: report,
                        final_state: ctx.state(),
                    })
                }
                Err(error) => {
                    let failed_after = ctx.state();
                    let last_status = ctx.run_status();
                    ctx.fail();
                    error!(state = %failed_after, error = %error, "Run failed; cleaning up");
                    let report = self.cleanup.cleanup(&mut ctx, mode).await;
                    Err(RunFailure {
                        target: request.target,
                        branch: request.branch,
                        failed_after,
                        error,
                        workdir: ctx.workdir_path().map(PathBuf::from),
                        run_id: ctx.run_id(),
                        last_status,
                        cleanup: report,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn forward(&self, ctx: &mut LifecycleContext) -> Result<(RunId, RunStatus)> {
        let deadline = Deadline::after(self.config.run_deadline);
        let url = self.platform.clone_url(ctx.target());

        deadline.guard("clone", self.staging.clone(ctx, &url)).await?;
        ctx.advance(LifecycleState::Cloned);

        deadline.guard("branch", self.staging.branch(ctx)).await?;
        ctx.advance(LifecycleState::Branched);

        deadline.guard("inject", self.staging.inject(ctx)).await?;
        ctx.advance(LifecycleState::Injected);

        deadline.guard("commit", self.staging.commit(ctx)).await?;
        deadline.guard("push", self.staging.push(ctx)).await?;
        ctx.advance(LifecycleState::Pushed);

        let run = deadline.guard("trigger", self.monitor.trigger(ctx)).await?;
        ctx.advance(LifecycleState::Triggered);

        ctx.advance(LifecycleState::Monitoring);
        let status = deadline.guard("poll", self.monitor.wait(ctx)).await?;

        deadline.guard("collect", self.monitor.collect(ctx)).await?;
        ctx.advance(LifecycleState::Collected);
        Ok((run, status))
    }
}
