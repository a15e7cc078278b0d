//! `recon` and `glrecon`.

use crate::cli::CliError;
use pipeprobe_ci::{AccessRecon, ReconConfig, ReconReport};
use pipeprobe_core::PlatformClient;
use std::sync::Arc;
use tracing::info;

/// Enumerate identity and reachable targets.
pub async fn execute(
    platform: Arc<dyn PlatformClient>,
    show_all: bool,
) -> Result<ReconReport, CliError> {
    let recon = AccessRecon::new(platform, ReconConfig::default().with_show_all(show_all));
    let report = recon.run().await?;
    info!(
        platform = %report.platform,
        targets = report.targets.len(),
        privilege = %report.privilege,
        "Recon complete"
    );
    Ok(report)
}
