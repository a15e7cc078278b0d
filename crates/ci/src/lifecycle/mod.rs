//! Pipeline injection lifecycle.
//!
//! A run moves through clone, branch, inject, commit, push, trigger, poll and
//! collect. Every side effect is recorded in the [`LifecycleContext`] as it
//! happens, and the [`CleanupCoordinator`] reverses them on the way out,
//! whether the forward path succeeded or not.

mod cleanup;
mod config;
mod context;
mod deadline;
mod monitor;
mod orchestrator;
mod staging;

pub use cleanup::{CleanupCoordinator, CleanupMode, CleanupReport, CleanupStep, CleanupWarning};
pub use config::{DEFAULT_COMMIT_MESSAGE, DEFAULT_REMOTE, LifecycleConfig, RunRequest};
pub use context::{Artifact, LifecycleContext, LifecycleState};
pub use deadline::Deadline;
pub use monitor::RunMonitor;
pub use orchestrator::{LifecycleOrchestrator, RunFailure, RunSummary};
pub use staging::RepoStaging;
