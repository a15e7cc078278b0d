//! Command-line surface: argument parsing, error categories and exit codes.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use pipeprobe_ci::RunFailure;
use pipeprobe_core::target::DEFAULT_BRANCH_PREFIX;
use pipeprobe_core::{BranchName, TargetRef};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Lifecycle or platform API failure exit code
pub const EXIT_FAILURE: i32 = 3;

/// Commit message of `glrun` when none is given.
pub const GITLAB_COMMIT_MESSAGE: &str = "Automated pipeline run";

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(pipeprobe::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A platform call outside a lifecycle failed (exit code 3)
    #[error("Platform error: {message}")]
    #[diagnostic(code(pipeprobe::cli::platform))]
    Platform {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A pipeline run failed; cleanup was already attempted (exit code 3)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Run(Box<RunFailure>),
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new platform error
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
            help: None,
        }
    }

    /// Short machine-readable category, used in JSON error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Platform { .. } => "platform",
            Self::Run(_) => "run",
        }
    }
}

impl From<RunFailure> for CliError {
    fn from(failure: RunFailure) -> Self {
        Self::Run(Box::new(failure))
    }
}

/// Configuration and target errors are the caller's to fix (exit code 2);
/// everything else came back from a platform or from git (exit code 3).
impl From<pipeprobe_core::Error> for CliError {
    fn from(err: pipeprobe_core::Error) -> Self {
        use pipeprobe_core::Error;
        match err {
            Error::Configuration { message, help } => Self::Config { message, help },
            Error::InvalidTarget { .. } => Self::config_with_help(
                err.to_string(),
                "Targets are written as namespace/name, e.g. my-org/my-repo",
            ),
            Error::Api {
                status: Some(401), ..
            } => Self::Platform {
                message: err.to_string(),
                help: Some("The token was rejected; check that it is valid and not expired".into()),
            },
            other => Self::platform(other.to_string()),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Platform { .. } | CliError::Run(_) => EXIT_FAILURE,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: CliError, json_mode: bool) {
    if json_mode {
        let envelope = ErrorEnvelope::new(crate::render::error_details(&err));
        match serde_json::to_string(&envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        if let CliError::Run(failure) = &err {
            let cleanup = crate::render::cleanup_text(&failure.cleanup);
            eprint!("{cleanup}");
        }
        let report = Report::new(err);
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Token recon and ephemeral CI pipeline injection.
///
/// `recon` and `run` talk to GitHub, `glrecon` and `glrun` to GitLab
/// (gitlab.com or self-hosted via `--gitlab-url`).
#[derive(Parser, Debug)]
#[command(name = "pipeprobe")]
#[command(about = "Token recon and ephemeral CI pipeline injection for GitHub and GitLab")]
#[command(
    after_help = "Examples:\n  pipeprobe recon --auth <GITHUB_TOKEN> --show-all\n  pipeprobe run --auth <GITHUB_TOKEN> --target org/repo --workflow-file ./probe.yaml\n  pipeprobe glrecon --auth <GITLAB_TOKEN> --gitlab-url https://gitlab.example.inc/api/v4\n  pipeprobe glrun --auth <GITLAB_TOKEN> --target group/project --pipeline-file ./probe-ci.yml"
)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Shorthand for `--level debug`.
    #[arg(short, long, global = true, help = "Enable verbose/debug logging")]
    pub verbose: bool,

    /// Log output format.
    #[arg(
        long = "log-format",
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelopes on stdout instead of tables.
    #[arg(long, global = true, help = "Emit JSON envelope instead of tables")]
    pub json: bool,
}

impl Cli {
    /// Effective log level, taking `--verbose` into account.
    #[must_use]
    pub const fn effective_level(&self) -> LogLevel {
        if self.verbose {
            match self.level {
                LogLevel::Trace => LogLevel::Trace,
                _ => LogLevel::Debug,
            }
        } else {
            self.level
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a GitHub token for repository access and privilege.
    Recon(GitHubReconArgs),
    /// Push a workflow to a GitHub repository, run it, collect logs, clean up.
    Run(GitHubRunArgs),
    /// Analyze a GitLab token for accessible projects and privilege.
    #[command(name = "glrecon")]
    GlRecon(GitLabReconArgs),
    /// Push a pipeline to a GitLab project, run it, collect logs, clean up.
    #[command(name = "glrun")]
    GlRun(GitLabRunArgs),
}

impl Commands {
    /// Subcommand name, for spans and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Recon(_) => "recon",
            Self::Run(_) => "run",
            Self::GlRecon(_) => "glrecon",
            Self::GlRun(_) => "glrun",
        }
    }
}

/// GitHub connection flags.
#[derive(Args, Debug, Clone)]
pub struct GitHubAuth {
    /// Personal access token.
    #[arg(
        short = 'a',
        long = "auth",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub personal access token"
    )]
    pub token: String,

    /// REST API base URL.
    #[arg(
        long = "api-url",
        env = "GITHUB_API_URL",
        default_value = pipeprobe_github::DEFAULT_API_URL,
        help = "GitHub API base URL (for GitHub Enterprise)"
    )]
    pub api_url: String,
}

/// GitLab connection flags.
#[derive(Args, Debug, Clone)]
pub struct GitLabAuth {
    /// Personal access token.
    #[arg(
        short = 'a',
        long = "auth",
        env = "GITLAB_TOKEN",
        hide_env_values = true,
        help = "GitLab personal access token"
    )]
    pub token: String,

    /// API base URL of the instance.
    #[arg(
        long = "gitlab-url",
        env = "GITLAB_URL",
        default_value = pipeprobe_gitlab::DEFAULT_API_URL,
        help = "GitLab API base URL, e.g. https://gitlab.example.inc/api/v4"
    )]
    pub gitlab_url: String,

    /// Username counted as instance administrator.
    #[arg(
        long,
        default_value = pipeprobe_gitlab::DEFAULT_SUPERUSER,
        help = "Username treated as instance administrator (empty to disable)"
    )]
    pub superuser: String,
}

/// `recon` arguments.
#[derive(Args, Debug, Clone)]
pub struct GitHubReconArgs {
    /// Connection flags.
    #[command(flatten)]
    pub auth: GitHubAuth,

    /// Include repositories the token can only read.
    #[arg(long, help = "Show all repositories, not only writable ones")]
    pub show_all: bool,
}

/// `glrecon` arguments.
#[derive(Args, Debug, Clone)]
pub struct GitLabReconArgs {
    /// Connection flags.
    #[command(flatten)]
    pub auth: GitLabAuth,

    /// List every visible project instead of memberships only.
    #[arg(long, help = "Show all visible projects, not only memberships")]
    pub show_all: bool,
}

/// `run` arguments.
#[derive(Args, Debug, Clone)]
pub struct GitHubRunArgs {
    /// Connection flags.
    #[command(flatten)]
    pub auth: GitHubAuth,

    /// Workflow definition to inject.
    #[arg(short = 'w', long = "workflow-file", help = "YAML workflow file to deploy")]
    pub workflow_file: PathBuf,

    /// Lifecycle flags.
    #[command(flatten)]
    pub run: RunOptions,
}

/// `glrun` arguments.
#[derive(Args, Debug, Clone)]
pub struct GitLabRunArgs {
    /// Connection flags.
    #[command(flatten)]
    pub auth: GitLabAuth,

    /// Pipeline definition to inject as `.gitlab-ci.yml`.
    #[arg(short = 'p', long = "pipeline-file", help = "Pipeline YAML file to deploy")]
    pub pipeline_file: PathBuf,

    /// Lifecycle flags.
    #[command(flatten)]
    pub run: RunOptions,
}

/// Flags shared by `run` and `glrun`.
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Target repository or project.
    #[arg(short, long, help = "Target as namespace/name")]
    pub target: TargetRef,

    /// Branch to create.
    #[arg(short, long, value_parser = parse_branch, help = "Branch name to use (random by default)")]
    pub branch: Option<BranchName>,

    /// Prefix of generated branch names.
    #[arg(long, default_value = DEFAULT_BRANCH_PREFIX, help = "Prefix for generated branch names")]
    pub branch_prefix: String,

    /// Commit message of the injected commit.
    #[arg(short = 'm', long, help = "Commit message")]
    pub commit_message: Option<String>,

    /// Keep branch and run, erase only the logs.
    #[arg(long, help = "Only delete run logs; leaves the branch and run visible")]
    pub only_delete_logs: bool,

    /// Seconds between two status polls.
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub poll_interval: u64,

    /// Seconds to wait for the run to finish.
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub poll_timeout: u64,

    /// Overall seconds for clone through log collection; 0 disables.
    #[arg(long, value_name = "SECS", default_value_t = 1200)]
    pub deadline: u64,

    /// Seconds allowed for each cleanup call.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub cleanup_timeout: u64,
}

impl RunOptions {
    /// The explicit branch, or a random one with the configured prefix.
    #[must_use]
    pub fn branch_name(&self) -> BranchName {
        self.branch
            .clone()
            .unwrap_or_else(|| BranchName::random(&self.branch_prefix))
    }

    /// Overall deadline, `None` when disabled.
    #[must_use]
    pub const fn run_deadline(&self) -> Option<Duration> {
        if self.deadline == 0 {
            None
        } else {
            Some(Duration::from_secs(self.deadline))
        }
    }
}

fn parse_branch(value: &str) -> pipeprobe_core::Result<BranchName> {
    BranchName::new(value)
}

/// Parse command line arguments into the CLI structure
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "pipeprobe",
            "run",
            "-a",
            "ghp_x",
            "-t",
            "acme/widgets",
            "-w",
            "probe.yaml",
            "-b",
            "lint-testing-abcde",
            "-m",
            "msg",
            "--only-delete-logs",
            "--poll-timeout",
            "30",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };
        assert_eq!(args.auth.token, "ghp_x");
        assert_eq!(args.auth.api_url, pipeprobe_github::DEFAULT_API_URL);
        assert_eq!(args.workflow_file, PathBuf::from("probe.yaml"));
        assert_eq!(args.run.target.full_path(), "acme/widgets");
        assert_eq!(args.run.branch_name().as_str(), "lint-testing-abcde");
        assert_eq!(args.run.commit_message.as_deref(), Some("msg"));
        assert!(args.run.only_delete_logs);
        assert_eq!(args.run.poll_timeout, 30);
    }

    #[test]
    fn test_glrun_uses_pipeline_file_flag() {
        let cli = Cli::try_parse_from([
            "pipeprobe",
            "glrun",
            "--auth",
            "glpat",
            "--target",
            "group/project",
            "--pipeline-file",
            "ci.yml",
            "--gitlab-url",
            "https://gitlab.example.inc/api/v4",
            "--deadline",
            "0",
        ])
        .unwrap();
        let Commands::GlRun(args) = cli.command else {
            panic!("Expected glrun command");
        };
        assert_eq!(args.pipeline_file, PathBuf::from("ci.yml"));
        assert_eq!(args.auth.gitlab_url, "https://gitlab.example.inc/api/v4");
        assert_eq!(args.auth.superuser, "root");
        assert!(args.run.run_deadline().is_none());
        assert!(args.run.branch.is_none());
    }

    #[test]
    fn test_generated_branch_uses_prefix() {
        let cli = Cli::try_parse_from([
            "pipeprobe",
            "glrun",
            "-a",
            "t",
            "-t",
            "g/p",
            "-p",
            "ci.yml",
            "--branch-prefix",
            "probe-",
        ])
        .unwrap();
        let Commands::GlRun(args) = cli.command else {
            panic!("Expected glrun command");
        };
        let branch = args.run.branch_name();
        assert!(branch.as_str().starts_with("probe-"));
        assert_eq!(branch.as_str().len(), "probe-".len() + 5);
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let err = Cli::try_parse_from([
            "pipeprobe", "run", "-a", "t", "-t", "not-a-target", "-w", "x.yaml",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_invalid_branch_is_rejected() {
        let err = Cli::try_parse_from([
            "pipeprobe", "run", "-a", "t", "-t", "a/b", "-w", "x.yaml", "-b", "bad branch",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_verbose_raises_level_to_debug() {
        let cli = Cli::try_parse_from(["pipeprobe", "-v", "recon", "-a", "t"]).unwrap();
        assert_eq!(cli.effective_level(), LogLevel::Debug);
        let cli = Cli::try_parse_from(["pipeprobe", "recon", "-a", "t", "-L", "error"]).unwrap();
        assert_eq!(cli.effective_level(), LogLevel::Error);
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["pipeprobe", "recon", "-a", "t"]).unwrap();
        assert_eq!(cli.log_format, TracingFormat::Compact);
        let cli =
            Cli::try_parse_from(["pipeprobe", "--log-format", "json", "recon", "-a", "t"]).unwrap();
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert!(Cli::try_parse_from(["pipeprobe", "--log-format", "xml", "recon"]).is_err());
    }

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let config: CliError = pipeprobe_core::Error::configuration("bad").into();
        assert_eq!(exit_code_for(&config), EXIT_CLI);

        let api: CliError = pipeprobe_core::Error::api("gitlab", Some(401), "401 Unauthorized").into();
        assert_eq!(exit_code_for(&api), EXIT_FAILURE);
        assert_eq!(api.code(), "platform");
        assert!(api.help().is_some());

        let target: CliError = TargetRef::parse("nope").unwrap_err().into();
        assert_eq!(exit_code_for(&target), EXIT_CLI);
    }
}
