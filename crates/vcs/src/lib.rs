//! git-backed [`VcsClient`] for pipeprobe.
//!
//! Shells out to the `git` binary rather than linking a git library: the
//! push/clone transports, credential handling and hooks then behave exactly
//! like the operator's own git. Every child process is killed when its future
//! is dropped, so a caller-side timeout cancels in-flight clones and pushes.

#![warn(missing_docs)]

use async_trait::async_trait;
use pipeprobe_core::{BranchName, CommitAuthor, Error, Result, VcsClient};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Placeholder substituted for credentials in any text that leaves this crate.
const REDACTED: &str = "***";

/// Separator between author name and email in `git log` output.
const FIELD_SEP: char = '\u{1f}';

/// [`VcsClient`] implementation that runs `git` subprocesses.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use `git` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, dir: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run `git <args>` and fail on a non-zero exit.
    async fn run(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        secret: Option<&SecretString>,
    ) -> Result<Output> {
        let subcommand = args.first().copied().unwrap_or("git");
        let output = self
            .command(dir)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::git(subcommand, format!("failed to spawn git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(subcommand, redact(stderr.trim(), secret)));
        }
        Ok(output)
    }

    async fn has_commits(&self, dir: &Path) -> Result<bool> {
        let output = self
            .command(Some(dir))
            .args(["rev-parse", "--verify", "--quiet", "HEAD"])
            .output()
            .await
            .map_err(|e| Error::git("rev-parse", format!("failed to spawn git: {e}")))?;
        Ok(output.status.success())
    }
}

/// Remove a secret, and any `user:password@` URL credentials, from `text`.
fn redact(text: &str, secret: Option<&SecretString>) -> String {
    let mut out = text.to_string();
    if let Some(secret) = secret {
        let exposed = secret.expose_secret();
        if !exposed.is_empty() {
            out = out.replace(exposed, REDACTED);
        }
    }
    redact_url_credentials(&out)
}

fn redact_url_credentials(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("://") {
        let (head, tail) = rest.split_at(pos + 3);
        out.push_str(head);
        let authority_end = tail
            .find(|c: char| c == '/' || c.is_whitespace() || c == '\'' || c == '"')
            .unwrap_or(tail.len());
        match tail[..authority_end].rfind('@') {
            Some(at) => {
                out.push_str(REDACTED);
                rest = &tail[at..];
            }
            None => rest = tail,
        }
    }
    out.push_str(rest);
    out
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        Error::configuration(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

#[async_trait]
impl VcsClient for GitCli {
    async fn clone_repo(&self, remote_url: &SecretString, dir: &Path) -> Result<()> {
        debug!(dir = %dir.display(), "Cloning repository");
        self.run(
            None,
            &["clone", "--quiet", remote_url.expose_secret(), path_arg(dir)?],
            Some(remote_url),
        )
        .await?;
        Ok(())
    }

    async fn create_and_checkout_branch(&self, dir: &Path, name: &BranchName) -> Result<()> {
        debug!(branch = %name, "Creating branch");
        self.run(Some(dir), &["checkout", "--quiet", "-b", name.as_str()], None)
            .await?;
        Ok(())
    }

    async fn stage_file(&self, dir: &Path, path: &Path) -> Result<()> {
        self.run(Some(dir), &["add", "--force", "--", path_arg(path)?], None)
            .await?;
        Ok(())
    }

    async fn commit(&self, dir: &Path, message: &str, author: &CommitAuthor) -> Result<()> {
        debug!(author = %author.name, "Committing");
        let output = self
            .command(Some(dir))
            .args(["commit", "--quiet", "--no-gpg-sign", "--no-verify", "-m", message])
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email)
            .output()
            .await
            .map_err(|e| Error::git("commit", format!("failed to spawn git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::git("commit", message));
        }
        Ok(())
    }

    async fn push(
        &self,
        dir: &Path,
        remote: &str,
        local_ref: &str,
        remote_ref: &str,
    ) -> Result<()> {
        let refspec = format!("{local_ref}:{remote_ref}");
        debug!(%remote, %refspec, "Pushing");
        self.run(Some(dir), &["push", "--quiet", remote, &refspec], None)
            .await?;
        Ok(())
    }

    async fn last_commit_author(&self, dir: &Path) -> Result<Option<CommitAuthor>> {
        if !self.has_commits(dir).await? {
            return Ok(None);
        }
        let format = format!("--format=%an{FIELD_SEP}%ae");
        let output = self.run(Some(dir), &["log", "-1", &format], None).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.trim_end_matches(['\n', '\r']);
        Ok(line
            .split_once(FIELD_SEP)
            .map(|(name, email)| CommitAuthor::new(name, email)))
    }
}
