//! GitHub Actions backend for pipeprobe.
//!
//! Implements [`PlatformClient`](pipeprobe_core::PlatformClient) with
//! `octocrab`. Workflows are injected under `.github/workflows/`, started by
//! the push itself, and discovered afterwards by branch. Runs can be deleted
//! outright; their logs come back as a zip archive that is unpacked per file.

#![warn(missing_docs)]

pub mod config;
mod logs;
pub mod platform;

pub use config::{DEFAULT_API_URL, GitHubConfig};
pub use platform::{GitHubPlatform, WORKFLOW_DIR, map_run_status};

/// Platform name used in logs and errors.
pub const PLATFORM: &str = "github";
