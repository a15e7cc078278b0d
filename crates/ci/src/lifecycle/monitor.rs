//! Remote side of a run: trigger, poll, collect logs.

use super::context::{Artifact, LifecycleContext};
use pipeprobe_core::{Error, LogBundle, PlatformClient, Result, RunId, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Starts a run and follows it to completion.
pub struct RunMonitor {
    platform: Arc<dyn PlatformClient>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl RunMonitor {
    /// Create a monitor polling every `poll_interval` for at most `poll_timeout`.
    #[must_use]
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            poll_interval,
            poll_timeout,
        }
    }

    fn run_id(ctx: &LifecycleContext) -> Result<RunId> {
        ctx.run_id()
            .ok_or_else(|| Error::configuration("no run has been triggered"))
    }

    /// Start a run for the pushed branch and record it.
    pub async fn trigger(&self, ctx: &mut LifecycleContext) -> Result<RunId> {
        let run = self
            .platform
            .trigger_run(ctx.target(), ctx.branch(), ctx.pipeline_path())
            .await
            .map_err(|e| Error::Trigger {
                target: ctx.target().to_string(),
                branch: ctx.branch().to_string(),
                source: Box::new(e),
            })?;
        ctx.set_run(run);
        ctx.record(Artifact::Run);
        info!(run = %run, "Triggered run");
        Ok(run)
    }

    /// Poll at a fixed interval until the run reaches a terminal status.
    ///
    /// Gives up with [`Error::PollTimeout`] once the polling budget is spent.
    /// The remote run is left alone; cancelling it is up to cleanup.
    pub async fn wait(&self, ctx: &mut LifecycleContext) -> Result<RunStatus> {
        let run = Self::run_id(ctx)?;
        let started = Instant::now();
        let polled = tokio::time::timeout(self.poll_timeout, async {
            loop {
                let status = self.platform.get_run_status(ctx.target(), run).await?;
                ctx.set_run_status(status);
                if status.is_terminal() {
                    return Ok(status);
                }
                debug!(run = %run, %status, "Run not finished");
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await;

        match polled {
            Ok(result) => {
                let status = result?;
                info!(run = %run, %status, elapsed_secs = started.elapsed().as_secs(), "Run finished");
                Ok(status)
            }
            Err(_) => Err(Error::PollTimeout {
                run_id: run.to_string(),
                waited_secs: started.elapsed().as_secs(),
            }),
        }
    }

    /// Retrieve the run's logs and record them.
    pub async fn collect(&self, ctx: &mut LifecycleContext) -> Result<LogBundle> {
        let run = Self::run_id(ctx)?;
        let logs = self
            .platform
            .get_run_logs(ctx.target(), run)
            .await
            .map_err(|e| Error::LogCollection {
                run_id: run.to_string(),
                source: Box::new(e),
            })?;
        debug!(run = %run, entries = logs.entries.len(), bytes = logs.total_bytes(), "Collected logs");
        ctx.set_logs(logs.clone());
        ctx.record(Artifact::Logs);
        Ok(logs)
    }
}
