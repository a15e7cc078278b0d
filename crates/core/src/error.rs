//! Error types shared by every pipeprobe crate.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeprobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing a token or driving a pipeline lifecycle.
///
/// The lifecycle variants (`Clone` through `LogCollection`) abort the forward
/// path of a run. Cleanup problems are never represented here; they are
/// collected as non-fatal warnings by the cleanup coordinator.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Cloning the target repository failed.
    #[error("Failed to clone {target}")]
    #[diagnostic(
        code(pipeprobe::lifecycle::clone),
        help("Check that the token can read the repository and that git is installed")
    )]
    Clone {
        /// Target reference (`namespace/name`)
        target: String,
        /// The underlying VCS error
        #[source]
        source: Box<Error>,
    },

    /// Creating or checking out the working branch failed.
    #[error("Failed to create branch {branch}")]
    #[diagnostic(
        code(pipeprobe::lifecycle::branch),
        help("Pick another name with --branch if the branch already exists")
    )]
    Branch {
        /// Branch name
        branch: String,
        /// The underlying VCS error
        #[source]
        source: Box<Error>,
    },

    /// The pipeline definition could not be placed into the working tree.
    #[error("Failed to inject pipeline file {}: {message}", path.display())]
    #[diagnostic(
        code(pipeprobe::lifecycle::injection),
        help("Check that the pipeline file exists and is readable")
    )]
    Injection {
        /// The pipeline file path involved
        path: PathBuf,
        /// The error message
        message: String,
        /// The underlying source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The injected commit could not be created.
    #[error("Failed to commit pipeline: {message}")]
    #[diagnostic(code(pipeprobe::lifecycle::commit))]
    Commit {
        /// The error message
        message: String,
        /// The underlying VCS error, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// Pushing the branch to the remote failed.
    #[error("Failed to push branch {branch}")]
    #[diagnostic(
        code(pipeprobe::lifecycle::push),
        help("The token needs write access to the repository (and the workflow scope on GitHub)")
    )]
    Push {
        /// Branch name
        branch: String,
        /// The underlying VCS error
        #[source]
        source: Box<Error>,
    },

    /// The platform refused or failed to start a run.
    #[error("Failed to trigger a run for {target} on {branch}")]
    #[diagnostic(code(pipeprobe::lifecycle::trigger))]
    Trigger {
        /// Target reference
        target: String,
        /// Branch the run was requested for
        branch: String,
        /// The underlying platform error
        #[source]
        source: Box<Error>,
    },

    /// The run did not reach a terminal state before the polling timeout.
    #[error("Run {run_id} did not finish within {waited_secs}s")]
    #[diagnostic(
        code(pipeprobe::lifecycle::poll_timeout),
        help("The remote run keeps going; raise --poll-timeout to wait longer")
    )]
    PollTimeout {
        /// Run identifier
        run_id: String,
        /// Seconds spent polling
        waited_secs: u64,
    },

    /// Logs of a finished run could not be retrieved.
    #[error("Failed to collect logs for run {run_id}")]
    #[diagnostic(code(pipeprobe::lifecycle::log_collection))]
    LogCollection {
        /// Run identifier
        run_id: String,
        /// The underlying platform error
        #[source]
        source: Box<Error>,
    },

    /// The overall per-run deadline expired while a step was in flight.
    #[error("Deadline of {seconds}s exceeded during {stage}")]
    #[diagnostic(code(pipeprobe::lifecycle::deadline))]
    DeadlineExceeded {
        /// The step that was interrupted
        stage: String,
        /// Configured deadline in seconds
        seconds: u64,
    },

    /// A platform API call failed or returned an unexpected status.
    #[error("{platform} API error: {message}")]
    #[diagnostic(code(pipeprobe::api))]
    Api {
        /// Platform name (github, gitlab)
        platform: String,
        /// HTTP status code, when a response was received
        status: Option<u16>,
        /// The error message
        message: String,
    },

    /// A git subprocess failed.
    #[error("git {command} failed: {message}")]
    #[diagnostic(code(pipeprobe::git))]
    Git {
        /// The git subcommand that failed
        command: String,
        /// Redacted stderr or spawn error
        message: String,
    },

    /// A target reference was not of the form `namespace/name`.
    #[error("Invalid target '{value}'")]
    #[diagnostic(
        code(pipeprobe::invalid_target),
        help("Targets are written as namespace/name, e.g. my-org/my-repo")
    )]
    InvalidTarget {
        /// The rejected value
        value: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(pipeprobe::config))]
    Configuration {
        /// The error message
        message: String,
        /// Help text for the user
        #[help]
        help: Option<String>,
    },

    /// Wrapped I/O error with operation context.
    #[error("I/O {operation} failed")]
    #[diagnostic(code(pipeprobe::io))]
    Io {
        /// What was being attempted
        operation: String,
        /// The path involved, if any
        path: Option<PathBuf>,
        /// The underlying source error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a new API error.
    #[must_use]
    pub fn api(platform: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            platform: platform.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text.
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(operation: impl Into<String>, path: Option<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path,
            source,
        }
    }

    /// Create a new commit error without an underlying cause.
    #[must_use]
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error is an API response with the given status.
    #[must_use]
    pub fn has_status(&self, code: u16) -> bool {
        matches!(self, Self::Api { status: Some(s), .. } if *s == code)
    }

    /// Whether this error aborts a lifecycle because of time rather than a refusal.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout { .. } | Self::DeadlineExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error() {
        let err = Error::api("gitlab", Some(403), "403 Forbidden");
        assert_eq!(err.to_string(), "gitlab API error: 403 Forbidden");
        assert!(err.has_status(403));
        assert!(!err.has_status(404));
    }

    #[test]
    fn test_git_error() {
        let err = Error::git("push", "remote rejected");
        assert_eq!(err.to_string(), "git push failed: remote rejected");
    }

    #[test]
    fn test_clone_error_keeps_source() {
        let err = Error::Clone {
            target: "org/repo".to_string(),
            source: Box::new(Error::git("clone", "repository not found")),
        };
        assert_eq!(err.to_string(), "Failed to clone org/repo");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("git clone failed: repository not found")
        );
    }

    #[test]
    fn test_poll_timeout_is_timeout() {
        let err = Error::PollTimeout {
            run_id: "42".to_string(),
            waited_secs: 600,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Run 42 did not finish within 600s");
        assert!(!Error::commit("no prior commit").is_timeout());
    }

    #[test]
    fn test_configuration_with_help() {
        let err = Error::configuration_with_help("missing token", "pass --auth");
        assert!(err.to_string().contains("missing token"));
        assert_eq!(
            err.help().map(|h| h.to_string()).as_deref(),
            Some("pass --auth")
        );
    }

    #[test]
    fn test_injection_error() {
        let err = Error::Injection {
            path: PathBuf::from("mal.yaml"),
            message: "file not found".to_string(),
            source: None,
        };
        assert_eq!(
            err.to_string(),
            "Failed to inject pipeline file mal.yaml: file not found"
        );
    }
}
