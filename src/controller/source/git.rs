//! # Git Client
//!
//! Version-control operations used by the source synchronizer.
//!
//! The production client shells out to the `git` command line through `tokio::process`
//! (no libgit2/OpenSSL dependency). Every invocation runs with `GIT_TERMINAL_PROMPT=0`
//! so a missing credential fails fast instead of waiting on a prompt, and is optionally
//! bounded by a timeout.

use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {operation}: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("git {operation} failed ({status}): {stderr}")]
    Failed {
        operation: &'static str,
        status: String,
        stderr: String,
    },
    #[error("git {operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

/// Version-control capability consumed by [`super::SourceSynchronizer`]
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `url` into `dest`, checking out only `branch`
    async fn clone_branch(&self, url: &str, branch: &str, dest: &Path) -> Result<(), GitError>;

    /// Name of the branch currently checked out in `repo`
    async fn current_branch(&self, repo: &Path) -> Result<String, GitError>;

    /// Fetch `branch` from `remote` and check it out, tracking the remote branch
    async fn switch_branch(&self, repo: &Path, remote: &str, branch: &str)
        -> Result<(), GitError>;

    /// Fetch from `remote` and fast-forward the current branch
    async fn pull(&self, repo: &Path, remote: &str) -> Result<(), GitError>;
}

/// `git` command-line implementation of [`GitClient`]
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    timeout: Option<Duration>,
}

impl GitCli {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn command(repo: Option<&Path>) -> Command {
        let mut cmd = Command::new("git");
        if let Some(repo) = repo {
            cmd.arg("-C").arg(repo);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
        cmd
    }

    async fn run(&self, operation: &'static str, mut cmd: Command) -> Result<Output, GitError> {
        debug!(operation, "git.command.start");
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_elapsed| GitError::Timeout {
                    operation,
                    secs: limit.as_secs(),
                })?,
            None => cmd.output().await,
        }
        .map_err(|source| GitError::Spawn { operation, source })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(GitError::Failed {
                operation,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn clone_branch(&self, url: &str, branch: &str, dest: &Path) -> Result<(), GitError> {
        let mut cmd = Self::command(None);
        cmd.args(["clone", "--branch", branch, "--single-branch", "--"])
            .arg(url)
            .arg(dest);
        self.run("clone", cmd).await.map(|_| ())
    }

    async fn current_branch(&self, repo: &Path) -> Result<String, GitError> {
        let mut cmd = Self::command(Some(repo));
        cmd.args(["rev-parse", "--abbrev-ref", "HEAD"]);
        let output = self.run("rev-parse", cmd).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn switch_branch(
        &self,
        repo: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<(), GitError> {
        // Single-branch clones only fetch their first branch; the new branch must be
        // part of the remote's fetch config before it can be tracked
        let mut track = Self::command(Some(repo));
        track.args(["remote", "set-branches", "--add", remote, branch]);
        self.run("remote", track).await?;

        let refspec = format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}");
        let mut fetch = Self::command(Some(repo));
        fetch.args(["fetch", remote, refspec.as_str()]);
        self.run("fetch", fetch).await?;

        let upstream = format!("{remote}/{branch}");
        let mut checkout = Self::command(Some(repo));
        checkout.args(["checkout", "-B", branch, "--track", upstream.as_str()]);
        self.run("checkout", checkout).await.map(|_| ())
    }

    async fn pull(&self, repo: &Path, remote: &str) -> Result<(), GitError> {
        let mut cmd = Self::command(Some(repo));
        cmd.args(["pull", "--ff-only", remote]);
        self.run("pull", cmd).await.map(|_| ())
    }
}
