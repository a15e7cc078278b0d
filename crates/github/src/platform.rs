//! [`PlatformClient`] over the GitHub REST API.

use crate::PLATFORM;
use crate::config::GitHubConfig;
use crate::logs;
use async_trait::async_trait;
use octocrab::Octocrab;
use pipeprobe_core::{
    AccessLevel, AccessRank, BranchName, Error, Identity, LogBundle, PlatformClient, Result,
    RunId, RunStatus, TargetRecord, TargetRef, Visibility,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory GitHub Actions loads workflows from.
pub const WORKFLOW_DIR: &str = ".github/workflows";

/// Statuses accepted from calls that return no content.
const NO_CONTENT_OK: &[u16] = &[200, 201, 204];

/// Cancellation is asynchronous on GitHub and answers `202 Accepted`.
const CANCEL_OK: &[u16] = &[200, 202, 204];

/// Upper bound on listing pages, in case a server ignores `page`.
const MAX_PAGES: u32 = 1000;

/// Runs fetched per discovery attempt; a push starts one run per `push` workflow.
const DISCOVERY_PAGE: u8 = 50;

#[derive(Debug, Deserialize)]
struct User {
    login: String,
    id: u64,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    site_admin: bool,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
struct Permissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    triage: bool,
    #[serde(default)]
    pull: bool,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    #[serde(default)]
    private: bool,
    visibility: Option<String>,
    owner: Owner,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    permissions: Permissions,
}

#[derive(Debug, Deserialize)]
struct WorkflowRuns {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    #[serde(default)]
    path: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
}

#[derive(Serialize)]
struct RepoListQuery<'a> {
    affiliation: &'a str,
    sort: &'a str,
    per_page: u8,
    page: u32,
}

#[derive(Serialize)]
struct RunListQuery<'a> {
    branch: &'a str,
    event: &'a str,
    per_page: u8,
}

fn api_error(err: octocrab::Error) -> Error {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            Error::api(PLATFORM, Some(source.status_code.as_u16()), source.message)
        }
        other => Error::api(PLATFORM, None, other.to_string()),
    }
}

/// Map the permission flags of a repository to the strongest grant.
fn access_level(permissions: &Permissions) -> Option<AccessLevel> {
    let (rank, label) = if permissions.admin {
        (AccessRank::Owner, "admin")
    } else if permissions.maintain {
        (AccessRank::Maintain, "maintain")
    } else if permissions.push {
        (AccessRank::Write, "write")
    } else if permissions.triage {
        (AccessRank::Read, "triage")
    } else if permissions.pull {
        (AccessRank::Read, "read")
    } else {
        return None;
    };
    Some(AccessLevel::new(rank, label))
}

fn visibility(repo: &Repository) -> Visibility {
    repo.visibility
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(if repo.private {
            Visibility::Private
        } else {
            Visibility::Public
        })
}

/// Map a workflow run's `status` and `conclusion` onto [`RunStatus`].
#[must_use]
pub fn map_run_status(status: Option<&str>, conclusion: Option<&str>) -> RunStatus {
    match status {
        Some("completed") => match conclusion {
            Some("success" | "neutral") => RunStatus::Succeeded,
            Some("cancelled" | "skipped" | "stale") => RunStatus::Canceled,
            _ => RunStatus::Failed,
        },
        Some("in_progress") => RunStatus::Running,
        _ => RunStatus::Pending,
    }
}

/// Repository-relative workflow path with `/` separators.
fn workflow_path(pipeline: &Path) -> String {
    pipeline
        .iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a run was started by the workflow at `wanted`.
///
/// Runs of reusable workflows report `path@ref`; only the path is compared.
fn started_by(run: &WorkflowRun, wanted: &str) -> bool {
    run.path
        .as_deref()
        .and_then(|path| path.split('@').next())
        .is_some_and(|path| path == wanted)
}

/// GitHub Actions backend.
pub struct GitHubPlatform {
    client: Octocrab,
    config: GitHubConfig,
}

impl GitHubPlatform {
    /// Build an authenticated client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API URL or client cannot be set up.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(config.token.expose_secret().to_string())
            .base_uri(config.api_url.as_str())
            .map_err(|e| {
                Error::configuration_with_help(
                    format!("Invalid GitHub API URL '{}': {e}", config.api_url),
                    "Use e.g. https://api.github.com or https://ghe.example.com/api/v3",
                )
            })?
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create GitHub client: {e}")))?;
        Ok(Self { client, config })
    }

    fn repo_route(target: &TargetRef) -> String {
        format!("/repos/{}/{}", target.namespace(), target.name())
    }

    async fn delete(&self, route: &str) -> Result<()> {
        debug!(%route, "DELETE");
        let response = self
            .client
            ._delete(route, None::<&()>)
            .await
            .map_err(api_error)?;
        let response = octocrab::map_github_error(response)
            .await
            .map_err(api_error)?;
        expect_status(response.status().as_u16(), NO_CONTENT_OK)
    }

    async fn post(&self, route: &str, accepted: &[u16]) -> Result<()> {
        debug!(%route, "POST");
        let response = self
            .client
            ._post(route, None::<&()>)
            .await
            .map_err(api_error)?;
        let response = octocrab::map_github_error(response)
            .await
            .map_err(api_error)?;
        expect_status(response.status().as_u16(), accepted)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let mut repositories = Vec::new();
        for page in 1..=MAX_PAGES {
            let query = RepoListQuery {
                affiliation: "owner,collaborator,organization_member",
                sort: "full_name",
                per_page: self.config.page_size,
                page,
            };
            let batch: Vec<Repository> = self
                .client
                .get("/user/repos", Some(&query))
                .await
                .map_err(api_error)?;
            let done = batch.len() < usize::from(self.config.page_size);
            debug!(page, count = batch.len(), "Listed repositories");
            repositories.extend(batch);
            if done {
                break;
            }
        }
        Ok(repositories)
    }
}

fn expect_status(status: u16, accepted: &[u16]) -> Result<()> {
    if accepted.contains(&status) {
        Ok(())
    } else {
        Err(Error::api(
            PLATFORM,
            Some(status),
            format!("unexpected status {status}"),
        ))
    }
}

#[async_trait]
impl PlatformClient for GitHubPlatform {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn pipeline_path(&self, source: &Path) -> PathBuf {
        let file_name = source
            .file_name()
            .map_or_else(|| "pipeline.yml".into(), ToOwned::to_owned);
        Path::new(WORKFLOW_DIR).join(file_name)
    }

    fn clone_url(&self, target: &TargetRef) -> SecretString {
        let origin = self.config.web_origin();
        let (scheme, host) = origin.split_once("://").unwrap_or(("https", origin.as_str()));
        SecretString::from(format!(
            "{scheme}://x-access-token:{}@{host}/{}.git",
            self.config.token.expose_secret(),
            target.full_path()
        ))
    }

    async fn get_identity(&self) -> Result<Identity> {
        let user: User = self
            .client
            .get("/user", None::<&()>)
            .await
            .map_err(api_error)?;
        Ok(Identity {
            username: user.login,
            display_name: user.name,
            id: user.id,
            email: user.email,
            is_admin_flag: user.site_admin,
        })
    }

    async fn list_accessible_targets(&self, show_all: bool) -> Result<Vec<TargetRecord>> {
        let username = self.get_identity().await?.username;
        let records = self
            .list_repositories()
            .await?
            .into_iter()
            .filter(|repo| {
                show_all
                    || repo.permissions.push
                    || repo.permissions.maintain
                    || repo.permissions.admin
            })
            .map(|repo| {
                let mut record = TargetRecord::new(repo.full_name.clone(), visibility(&repo));
                record.owned_by_caller = repo.owner.login.eq_ignore_ascii_case(&username);
                record.archived = repo.archived;
                record.project_access = access_level(&repo.permissions);
                record
            })
            .collect::<Vec<_>>();
        info!(count = records.len(), show_all, "Listed GitHub repositories");
        Ok(records)
    }

    /// A push to a branch carrying a `push`-triggered workflow starts the run,
    /// so this only has to find it. The push also starts every other `push`
    /// workflow of the repository; only the run of the injected file counts.
    async fn trigger_run(
        &self,
        target: &TargetRef,
        branch: &BranchName,
        pipeline: &Path,
    ) -> Result<RunId> {
        let route = format!("{}/actions/runs", Self::repo_route(target));
        let query = RunListQuery {
            branch: branch.as_str(),
            event: "push",
            per_page: DISCOVERY_PAGE,
        };
        let wanted = workflow_path(pipeline);
        let attempts = self.config.discovery_attempts.max(1);
        for attempt in 1..=attempts {
            let runs: WorkflowRuns = self
                .client
                .get(&route, Some(&query))
                .await
                .map_err(api_error)?;
            if let Some(run) = runs.workflow_runs.iter().find(|run| started_by(run, &wanted)) {
                debug!(attempt, run = run.id, workflow = %wanted, "Found workflow run");
                return Ok(RunId(run.id));
            }
            debug!(
                attempt,
                attempts,
                %branch,
                others = runs.workflow_runs.len(),
                workflow = %wanted,
                "No run of the injected workflow yet"
            );
            if attempt < attempts {
                tokio::time::sleep(self.config.discovery_interval).await;
            }
        }
        Err(Error::api(
            PLATFORM,
            None,
            format!(
                "no workflow run of {wanted} started for branch {branch} after {attempts} \
                 attempts; does the workflow trigger on push?"
            ),
        ))
    }

    async fn get_run_status(&self, target: &TargetRef, run: RunId) -> Result<RunStatus> {
        let route = format!("{}/actions/runs/{run}", Self::repo_route(target));
        let run: WorkflowRun = self
            .client
            .get(&route, None::<&()>)
            .await
            .map_err(api_error)?;
        Ok(map_run_status(run.status.as_deref(), run.conclusion.as_deref()))
    }

    async fn get_run_logs(&self, target: &TargetRef, run: RunId) -> Result<LogBundle> {
        let archive = self
            .client
            .actions()
            .download_workflow_run_logs(
                target.namespace(),
                target.name(),
                octocrab::models::RunId(run.0),
            )
            .await
            .map_err(api_error)?;
        logs::extract(&archive)
    }

    async fn cancel_run(&self, target: &TargetRef, run: RunId) -> Result<()> {
        self.post(
            &format!("{}/actions/runs/{run}/cancel", Self::repo_route(target)),
            CANCEL_OK,
        )
        .await
    }

    async fn delete_run(&self, target: &TargetRef, run: RunId) -> Result<()> {
        self.delete(&format!("{}/actions/runs/{run}", Self::repo_route(target)))
            .await
    }

    async fn delete_logs(&self, target: &TargetRef, run: RunId) -> Result<()> {
        self.delete(&format!("{}/actions/runs/{run}/logs", Self::repo_route(target)))
            .await
    }

    async fn delete_branch(&self, target: &TargetRef, branch: &BranchName) -> Result<()> {
        self.delete(&format!(
            "{}/git/refs/heads/{branch}",
            Self::repo_route(target)
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_run_status() {
        assert_eq!(map_run_status(Some("queued"), None), RunStatus::Pending);
        assert_eq!(map_run_status(Some("waiting"), None), RunStatus::Pending);
        assert_eq!(map_run_status(None, None), RunStatus::Pending);
        assert_eq!(map_run_status(Some("in_progress"), None), RunStatus::Running);
        assert_eq!(
            map_run_status(Some("completed"), Some("success")),
            RunStatus::Succeeded
        );
        assert_eq!(
            map_run_status(Some("completed"), Some("failure")),
            RunStatus::Failed
        );
        assert_eq!(
            map_run_status(Some("completed"), Some("timed_out")),
            RunStatus::Failed
        );
        assert_eq!(
            map_run_status(Some("completed"), Some("cancelled")),
            RunStatus::Canceled
        );
    }

    #[test]
    fn test_access_level_picks_strongest_flag() {
        let perms = Permissions {
            admin: false,
            maintain: false,
            push: true,
            triage: true,
            pull: true,
        };
        let level = access_level(&perms).unwrap();
        assert_eq!(level.rank, AccessRank::Write);
        assert_eq!(level.label, "write");
        assert!(access_level(&Permissions::default()).is_none());
    }

    #[test]
    fn test_visibility_falls_back_to_private_flag() {
        let repo = Repository {
            full_name: "a/b".into(),
            private: true,
            visibility: None,
            owner: Owner { login: "a".into() },
            archived: false,
            permissions: Permissions::default(),
        };
        assert_eq!(visibility(&repo), Visibility::Private);
    }

    #[test]
    fn test_started_by_compares_workflow_path() {
        let run = |path: Option<&str>| WorkflowRun {
            id: 1,
            path: path.map(str::to_string),
            status: None,
            conclusion: None,
        };
        let wanted = workflow_path(Path::new(".github/workflows/mal.yaml"));
        assert_eq!(wanted, ".github/workflows/mal.yaml");
        assert!(started_by(&run(Some(".github/workflows/mal.yaml")), &wanted));
        assert!(started_by(&run(Some(".github/workflows/mal.yaml@refs/heads/x")), &wanted));
        assert!(!started_by(&run(Some(".github/workflows/ci.yml")), &wanted));
        assert!(!started_by(&run(None), &wanted));
    }

    #[test]
    fn test_expect_status() {
        assert!(expect_status(204, NO_CONTENT_OK).is_ok());
        assert!(expect_status(202, NO_CONTENT_OK).is_err());
        assert!(expect_status(202, CANCEL_OK).is_ok());
    }
}
