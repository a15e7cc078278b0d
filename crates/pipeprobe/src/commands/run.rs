//! `run` and `glrun`.

use crate::cli::{CliError, RunOptions};
use pipeprobe_ci::{LifecycleConfig, LifecycleOrchestrator, RunRequest, RunSummary};
use pipeprobe_core::{PlatformClient, VcsClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle timings from the command line.
#[must_use]
pub fn lifecycle_config(options: &RunOptions) -> LifecycleConfig {
    LifecycleConfig::default()
        .with_poll_interval(Duration::from_secs(options.poll_interval.max(1)))
        .with_poll_timeout(Duration::from_secs(options.poll_timeout))
        .with_run_deadline(options.run_deadline())
        .with_cleanup_call_timeout(Duration::from_secs(options.cleanup_timeout))
}

/// Build the run request; the pipeline file must exist before anything is cloned.
pub fn request(
    options: &RunOptions,
    pipeline_file: &Path,
    default_message: &str,
) -> Result<RunRequest, CliError> {
    if !pipeline_file.is_file() {
        return Err(CliError::config_with_help(
            format!("Pipeline file {} does not exist", pipeline_file.display()),
            "Pass the path of a local YAML pipeline definition",
        ));
    }
    let message = options
        .commit_message
        .clone()
        .unwrap_or_else(|| default_message.to_string());
    Ok(RunRequest::new(options.target.clone(), pipeline_file)
        .with_branch(options.branch_name())
        .with_commit_message(message)
        .with_only_delete_logs(options.only_delete_logs))
}

/// Drive one lifecycle to the end.
pub async fn execute(
    platform: Arc<dyn PlatformClient>,
    vcs: Arc<dyn VcsClient>,
    config: LifecycleConfig,
    request: RunRequest,
) -> Result<RunSummary, CliError> {
    let orchestrator = LifecycleOrchestrator::new(platform, vcs, config);
    let summary = orchestrator.run(request).await?;
    if summary.cleanup.is_clean() {
        info!(run_id = %summary.run_id, status = %summary.status, "Run finished");
    } else {
        warn!(
            run_id = %summary.run_id,
            warnings = summary.cleanup.warnings.len(),
            "Run finished but cleanup left artifacts behind"
        );
    }
    Ok(summary)
}
