//! pipeprobe CLI library.
//!
//! The binary in `main.rs` is a thin shell around this crate: [`cli`] parses
//! arguments, [`commands`] runs recon or a pipeline lifecycle against the
//! selected platform, and [`render`] turns the outcome into tables or JSON.

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod render;
pub mod tracing;

pub use cli::{Cli, CliError, Commands, EXIT_CLI, EXIT_FAILURE, EXIT_OK, exit_code_for};
pub use commands::Outcome;
