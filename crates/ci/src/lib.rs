//! Pipeline lifecycle orchestration and access recon for pipeprobe.
//!
//! - [`lifecycle`]: inject a pipeline definition into a target repository,
//!   run it, collect its logs, and remove the traces afterwards
//! - [`recon`]: enumerate what a token can reach and how privileged it is
//!
//! Both work purely against the [`PlatformClient`](pipeprobe_core::PlatformClient)
//! and [`VcsClient`](pipeprobe_core::VcsClient) traits.

#![warn(missing_docs)]

pub mod lifecycle;
pub mod recon;

pub use lifecycle::{
    Artifact, CleanupMode, CleanupReport, CleanupWarning, LifecycleConfig, LifecycleOrchestrator,
    LifecycleState, RunFailure, RunRequest, RunSummary,
};
pub use recon::{AccessRecon, ReconConfig, ReconReport};
