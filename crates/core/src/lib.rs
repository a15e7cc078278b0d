//! Core types and collaborator traits for pipeprobe.
//!
//! This crate holds everything the lifecycle orchestrator and the recon
//! analyzer share with the platform backends:
//!
//! - [`Error`] and [`Result`]
//! - [`PlatformClient`], implemented by the GitHub and GitLab crates
//! - [`VcsClient`], implemented by `pipeprobe-vcs`
//! - identity, target and run descriptors
//!
//! # Features
//!
//! - `testing`: recording fakes of both collaborator traits ([`testing`])

#![warn(missing_docs)]

pub mod error;
pub mod identity;
pub mod platform;
pub mod run;
pub mod target;
pub mod vcs;

#[cfg(feature = "testing")]
pub mod testing;

pub use error::{Error, Result};
pub use identity::{
    AccessLevel, AccessRank, AccessSummary, AccessibleTarget, Identity, PrivilegeLevel,
    TargetRecord, Visibility,
};
pub use platform::PlatformClient;
pub use run::{LogBundle, LogEntry, RunId, RunStatus};
pub use target::{BranchName, TargetRef};
pub use vcs::{CommitAuthor, VcsClient};
