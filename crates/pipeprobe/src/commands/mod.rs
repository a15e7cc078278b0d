//! Subcommand execution.
//!
//! Each subcommand builds its platform client from the parsed flags and hands
//! it to the recon analyzer or the lifecycle orchestrator. Rendering is left
//! to the caller through [`Outcome`].

pub mod recon;
pub mod run;

use crate::cli::{CliError, Commands, GITLAB_COMMIT_MESSAGE, GitHubAuth, GitLabAuth};
use crate::render;
use pipeprobe_ci::lifecycle::DEFAULT_COMMIT_MESSAGE;
use pipeprobe_ci::{ReconReport, RunSummary};
use pipeprobe_core::PlatformClient;
use pipeprobe_github::{GitHubConfig, GitHubPlatform};
use pipeprobe_gitlab::{GitLabConfig, GitLabPlatform};
use pipeprobe_vcs::GitCli;
use secrecy::SecretString;
use std::sync::Arc;

const GITLAB_API_SUFFIX: &str = "/api/v4";

/// What a subcommand produced.
#[derive(Debug)]
pub enum Outcome {
    /// `recon` / `glrecon`
    Recon(ReconReport),
    /// `run` / `glrun`
    Run(Box<RunSummary>),
}

impl Outcome {
    /// Text tables, or a JSON envelope when `json` is set.
    pub fn render(&self, json: bool) -> Result<String, CliError> {
        match (self, json) {
            (Self::Recon(report), true) => render::json(report),
            (Self::Recon(report), false) => Ok(render::recon_text(report)),
            (Self::Run(summary), true) => render::json(summary),
            (Self::Run(summary), false) => Ok(render::run_text(summary)),
        }
    }
}

/// Run a parsed subcommand to completion.
pub async fn execute(command: &Commands) -> Result<Outcome, CliError> {
    match command {
        Commands::Recon(args) => {
            let platform = github_platform(&args.auth)?;
            recon::execute(platform, args.show_all)
                .await
                .map(Outcome::Recon)
        }
        Commands::GlRecon(args) => {
            let platform = gitlab_platform(&args.auth)?;
            recon::execute(platform, args.show_all)
                .await
                .map(Outcome::Recon)
        }
        Commands::Run(args) => {
            let platform = github_platform(&args.auth)?;
            let request = run::request(&args.run, &args.workflow_file, DEFAULT_COMMIT_MESSAGE)?;
            run::execute(platform, Arc::new(GitCli::new()), run::lifecycle_config(&args.run), request)
                .await
                .map(|summary| Outcome::Run(Box::new(summary)))
        }
        Commands::GlRun(args) => {
            let platform = gitlab_platform(&args.auth)?;
            let request = run::request(&args.run, &args.pipeline_file, GITLAB_COMMIT_MESSAGE)?;
            run::execute(platform, Arc::new(GitCli::new()), run::lifecycle_config(&args.run), request)
                .await
                .map(|summary| Outcome::Run(Box::new(summary)))
        }
    }
}

fn token(raw: &str, env: &str) -> Result<SecretString, CliError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(CliError::config_with_help(
            "The access token is empty",
            format!("Pass --auth or set {env}"),
        ));
    }
    Ok(SecretString::from(token.to_string()))
}

/// GitHub client from `--auth` / `--api-url`.
pub fn github_platform(auth: &GitHubAuth) -> Result<Arc<dyn PlatformClient>, CliError> {
    let config = GitHubConfig::new(token(&auth.token, "GITHUB_TOKEN")?).with_api_url(&auth.api_url);
    Ok(Arc::new(GitHubPlatform::new(config)?))
}

/// GitLab client from `--auth` / `--gitlab-url` / `--superuser`.
pub fn gitlab_platform(auth: &GitLabAuth) -> Result<Arc<dyn PlatformClient>, CliError> {
    let superuser = Some(auth.superuser.trim())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);
    let config = GitLabConfig::new(token(&auth.token, "GITLAB_TOKEN")?)
        .with_api_url(gitlab_api_url(&auth.gitlab_url))
        .with_superuser(superuser);
    Ok(Arc::new(GitLabPlatform::new(config)?))
}

/// Accept both an instance origin and its API base URL.
#[must_use]
pub fn gitlab_api_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.ends_with(GITLAB_API_SUFFIX) {
        url.to_string()
    } else {
        format!("{url}{GITLAB_API_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gitlab_api_url_normalization() {
        assert_eq!(
            gitlab_api_url("https://gitlab.example.inc"),
            "https://gitlab.example.inc/api/v4"
        );
        assert_eq!(
            gitlab_api_url("https://gitlab.example.inc/api/v4/"),
            "https://gitlab.example.inc/api/v4"
        );
    }

    #[test]
    fn test_blank_token_is_a_config_error() {
        let auth = GitLabAuth {
            token: "  ".to_string(),
            gitlab_url: "https://gitlab.com".to_string(),
            superuser: "root".to_string(),
        };
        let err = gitlab_platform(&auth).err().unwrap();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_empty_superuser_disables_name_check() {
        let auth = GitLabAuth {
            token: "glpat".to_string(),
            gitlab_url: "https://gitlab.com".to_string(),
            superuser: String::new(),
        };
        let platform = gitlab_platform(&auth).unwrap();
        assert!(platform.superuser_name().is_none());
        assert_eq!(platform.name(), "gitlab");
    }
}
