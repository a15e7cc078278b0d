//! GitLab CI backend for pipeprobe.
//!
//! Talks to the v4 REST API of gitlab.com or a self-hosted instance with
//! `reqwest`, authenticating with a `PRIVATE-TOKEN` header. The pipeline
//! definition always lands in `.gitlab-ci.yml`; the push normally starts a
//! pipeline, and one is created for the branch when it does not.

#![warn(missing_docs)]

pub mod config;
pub mod platform;

pub use config::{DEFAULT_API_URL, DEFAULT_SUPERUSER, GitLabConfig};
pub use platform::{GitLabPlatform, PIPELINE_FILE, access_level, map_pipeline_status};

/// Platform name used in logs and errors.
pub const PLATFORM: &str = "gitlab";
