//! [`PlatformClient`] over the GitLab v4 REST API.

use crate::PLATFORM;
use crate::config::GitLabConfig;
use async_trait::async_trait;
use pipeprobe_core::{
    AccessLevel, AccessRank, BranchName, Error, Identity, LogBundle, PlatformClient, Result,
    RunId, RunStatus, TargetRecord, TargetRef, Visibility,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File GitLab reads the pipeline definition from.
pub const PIPELINE_FILE: &str = ".gitlab-ci.yml";

/// Any other status fails the call.
const OK_STATUSES: &[u16] = &[200, 201, 204];

/// Upper bound on listing pages, in case `x-next-page` never runs out.
const MAX_PAGES: u32 = 1000;

#[derive(Debug, Deserialize)]
struct User {
    username: String,
    id: u64,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Access {
    access_level: u8,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectPermissions {
    project_access: Option<Access>,
    group_access: Option<Access>,
}

#[derive(Debug, Deserialize)]
struct Project {
    path_with_namespace: String,
    visibility: Option<String>,
    #[serde(default)]
    archived: bool,
    owner: Option<Namespace>,
    #[serde(default)]
    permissions: Option<ProjectPermissions>,
}

#[derive(Debug, Deserialize)]
struct Pipeline {
    id: u64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: u64,
    name: String,
    stage: Option<String>,
}

/// Name a numeric access level the way GitLab does, e.g. `Developer (30)`.
#[must_use]
pub fn access_level(level: u8) -> Option<AccessLevel> {
    let (rank, name) = match level {
        50 => (AccessRank::Owner, "Owner"),
        40 => (AccessRank::Maintain, "Maintainer"),
        30 => (AccessRank::Write, "Developer"),
        20 => (AccessRank::Read, "Reporter"),
        10 => (AccessRank::Read, "Guest"),
        5 => (AccessRank::Read, "Minimal Access"),
        _ => return None,
    };
    Some(AccessLevel::new(rank, format!("{name} ({level})")))
}

/// Map a pipeline status onto [`RunStatus`].
#[must_use]
pub fn map_pipeline_status(status: &str) -> RunStatus {
    match status {
        "success" => RunStatus::Succeeded,
        "failed" => RunStatus::Failed,
        "running" | "canceling" => RunStatus::Running,
        "canceled" | "skipped" => RunStatus::Canceled,
        _ => RunStatus::Pending,
    }
}

fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<serde_json::Value>,
        error: Option<String>,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message
            .as_str()
            .map_or_else(|| message.to_string(), ToString::to_string),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ => body.trim().chars().take(200).collect(),
    }
}

/// GitLab CI backend.
pub struct GitLabPlatform {
    client: Client,
    base: Url,
    config: GitLabConfig,
}

impl GitLabPlatform {
    /// Build an authenticated client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API URL or token is unusable, or
    /// the HTTP client cannot be created.
    pub fn new(config: GitLabConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                Error::configuration_with_help(
                    format!("Invalid GitLab API URL '{}'", config.api_url),
                    "Use e.g. https://gitlab.example.inc/api/v4",
                )
            })?;
        let mut token = HeaderValue::from_str(config.token.expose_secret()).map_err(|_| {
            Error::configuration("GitLab token contains characters not allowed in a header")
        })?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("PRIVATE-TOKEN", token);

        let client = Client::builder()
            .user_agent(concat!("pipeprobe/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create GitLab client: {e}")))?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// API URL with `segments` appended, each encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects URLs that cannot carry a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `/projects/:id/...`; the id is the full path, so `/` is encoded too.
    fn project(&self, target: &TargetRef, rest: &[&str]) -> Url {
        let id = target.full_path();
        let mut segments = vec!["projects", id.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::api(PLATFORM, None, format!("{what}: {e}")))?;
        let status = response.status().as_u16();
        if OK_STATUSES.contains(&status) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status, %what, "GitLab API call failed");
        Err(Error::api(
            PLATFORM,
            Some(status),
            format!("{what}: {}", api_message(&body)),
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let route = url.path().to_string();
        debug!(%route, "GET");
        let response = self.send(self.client.get(url).query(query), &route).await?;
        response
            .json()
            .await
            .map_err(|e| Error::api(PLATFORM, None, format!("{route}: invalid response: {e}")))
    }

    /// Follow `x-next-page` until the listing is exhausted.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let route = url.path().to_string();
        let mut items = Vec::new();
        let mut page = 1;
        while page <= MAX_PAGES {
            let mut params = query.to_vec();
            params.push(("per_page", self.config.page_size.to_string()));
            params.push(("page", page.to_string()));
            let response = self
                .send(self.client.get(url.clone()).query(&params), &route)
                .await?;
            let next = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            let batch: Vec<T> = response.json().await.map_err(|e| {
                Error::api(PLATFORM, None, format!("{route}: invalid response: {e}"))
            })?;
            debug!(%route, page, count = batch.len(), "Fetched page");
            items.extend(batch);
            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(items)
    }

    async fn post(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        let route = url.path().to_string();
        debug!(%route, "POST");
        self.send(self.client.post(url).query(query), &route).await
    }

    async fn delete(&self, url: Url) -> Result<()> {
        let route = url.path().to_string();
        debug!(%route, "DELETE");
        self.send(self.client.delete(url), &route).await.map(drop)
    }

    async fn jobs(&self, target: &TargetRef, run: RunId) -> Result<Vec<Job>> {
        let run = run.to_string();
        self.get_paginated(self.project(target, &["pipelines", &run, "jobs"]), &[])
            .await
    }

    async fn find_pipeline(&self, target: &TargetRef, branch: &BranchName) -> Result<Option<u64>> {
        let pipelines: Vec<Pipeline> = self
            .get_json(
                self.project(target, &["pipelines"]),
                &[
                    ("ref", branch.to_string()),
                    ("per_page", "1".to_string()),
                ],
            )
            .await?;
        Ok(pipelines.first().map(|p| p.id))
    }
}

#[async_trait]
impl PlatformClient for GitLabPlatform {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn superuser_name(&self) -> Option<&str> {
        self.config.superuser.as_deref()
    }

    fn pipeline_path(&self, _source: &Path) -> PathBuf {
        PathBuf::from(PIPELINE_FILE)
    }

    fn clone_url(&self, target: &TargetRef) -> SecretString {
        let origin = self.config.web_origin();
        let (scheme, host) = origin.split_once("://").unwrap_or(("https", origin));
        SecretString::from(format!(
            "{scheme}://oauth2:{}@{host}/{}.git",
            self.config.token.expose_secret(),
            target.full_path()
        ))
    }

    async fn get_identity(&self) -> Result<Identity> {
        let user: User = self.get_json(self.endpoint(&["user"]), &[]).await?;
        Ok(Identity {
            username: user.username,
            display_name: user.name,
            id: user.id,
            email: user.email,
            is_admin_flag: user.is_admin,
        })
    }

    async fn list_accessible_targets(&self, show_all: bool) -> Result<Vec<TargetRecord>> {
        let username = self.get_identity().await?.username;
        let query = if show_all {
            Vec::new()
        } else {
            vec![("membership", "true".to_string())]
        };
        let projects: Vec<Project> = self
            .get_paginated(self.endpoint(&["projects"]), &query)
            .await?;
        let records: Vec<TargetRecord> = projects
            .into_iter()
            .map(|project| {
                let visibility = project
                    .visibility
                    .as_deref()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(Visibility::Private);
                let permissions = project.permissions.unwrap_or_default();
                let mut record = TargetRecord::new(project.path_with_namespace, visibility);
                record.owned_by_caller = project
                    .owner
                    .is_some_and(|owner| owner.username.eq_ignore_ascii_case(&username));
                record.archived = project.archived;
                record.project_access = permissions
                    .project_access
                    .and_then(|a| access_level(a.access_level));
                record.group_access = permissions
                    .group_access
                    .and_then(|a| access_level(a.access_level));
                record
            })
            .collect();
        info!(count = records.len(), show_all, "Listed GitLab projects");
        Ok(records)
    }

    /// Find the pipeline the push started; create one for the branch if none shows up.
    async fn trigger_run(
        &self,
        target: &TargetRef,
        branch: &BranchName,
        _pipeline: &Path,
    ) -> Result<RunId> {
        let attempts = self.config.discovery_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(id) = self.find_pipeline(target, branch).await? {
                debug!(attempt, pipeline = id, "Found pipeline");
                return Ok(RunId(id));
            }
            debug!(attempt, attempts, %branch, "No pipeline yet");
            if attempt < attempts {
                tokio::time::sleep(self.config.discovery_interval).await;
            }
        }

        if !self.config.create_on_missing {
            return Err(Error::api(
                PLATFORM,
                None,
                format!("no pipeline started for branch {branch} after {attempts} attempts"),
            ));
        }
        info!(%branch, "No pipeline started by the push; creating one");
        let url = self.project(target, &["pipeline"]);
        let route = url.path().to_string();
        let pipeline: Pipeline = self
            .post(url, &[("ref", branch.to_string())])
            .await?
            .json()
            .await
            .map_err(|e| Error::api(PLATFORM, None, format!("{route}: invalid response: {e}")))?;
        debug!(pipeline = pipeline.id, status = %pipeline.status, "Created pipeline");
        Ok(RunId(pipeline.id))
    }

    async fn get_run_status(&self, target: &TargetRef, run: RunId) -> Result<RunStatus> {
        let run = run.to_string();
        let pipeline: Pipeline = self
            .get_json(self.project(target, &["pipelines", &run]), &[])
            .await?;
        Ok(map_pipeline_status(&pipeline.status))
    }

    async fn get_run_logs(&self, target: &TargetRef, run: RunId) -> Result<LogBundle> {
        let mut bundle = LogBundle::default();
        for job in self.jobs(target, run).await? {
            let url = self.project(target, &["jobs", &job.id.to_string(), "trace"]);
            let route = url.path().to_string();
            let trace = self
                .send(self.client.get(url), &route)
                .await?
                .text()
                .await
                .map_err(|e| Error::api(PLATFORM, None, format!("{route}: {e}")))?;
            let name = match job.stage {
                Some(stage) => format!("{stage}/{}", job.name),
                None => job.name,
            };
            bundle.push(name, trace);
        }
        Ok(bundle)
    }

    async fn cancel_run(&self, target: &TargetRef, run: RunId) -> Result<()> {
        let run = run.to_string();
        self.post(self.project(target, &["pipelines", &run, "cancel"]), &[])
            .await
            .map(drop)
    }

    async fn delete_run(&self, target: &TargetRef, run: RunId) -> Result<()> {
        let run = run.to_string();
        self.delete(self.project(target, &["pipelines", &run])).await
    }

    /// Erase every job of the pipeline, continuing past failures.
    async fn delete_logs(&self, target: &TargetRef, run: RunId) -> Result<()> {
        let mut first_error = None;
        for job in self.jobs(target, run).await? {
            let url = self.project(target, &["jobs", &job.id.to_string(), "erase"]);
            if let Err(e) = self.post(url, &[]).await {
                warn!(job = job.id, error = %e, "Failed to erase job");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn delete_branch(&self, target: &TargetRef, branch: &BranchName) -> Result<()> {
        self.delete(self.project(target, &["repository", "branches", branch.as_str()]))
            .await
    }
}
