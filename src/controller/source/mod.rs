//! # Source Synchronizer
//!
//! Keeps one local mirror of each deployment's Git repository and brings it up to
//! date with the requested branch before manifests are applied.
//!
//! - First sight of a deployment: clone the branch into `<mirror root>/<namespace>/<name>`
//! - Mirror present: verify the checked-out branch, switch in place if the spec moved to
//!   another branch, then fast-forward pull from the remote
//! - Finalization: delete the mirror directory

mod git;
mod mirror;

pub use git::{GitCli, GitClient, GitError};
pub use mirror::{heads_reference, manifests_path, mirror_path, normalize_branch};

use crate::crd::DeploymentIdentity;
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to clone {url} ({reference}) into {}: {source}", .path.display())]
    Clone {
        url: String,
        reference: String,
        path: PathBuf,
        #[source]
        source: GitError,
    },
    #[error("failed to switch {} to {reference}: {source}", .path.display())]
    Switch {
        reference: String,
        path: PathBuf,
        #[source]
        source: GitError,
    },
    #[error("failed to pull {}: {source}", .path.display())]
    Pull {
        path: PathBuf,
        #[source]
        source: GitError,
    },
    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Owns the mirror root and the git client used to maintain mirrors beneath it
#[derive(Clone)]
pub struct SourceSynchronizer {
    root: PathBuf,
    remote: String,
    git: Arc<dyn GitClient>,
}

impl SourceSynchronizer {
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>, git: Arc<dyn GitClient>) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
            git,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirror directory of a deployment under this synchronizer's root
    #[must_use]
    pub fn mirror_path(&self, identity: &DeploymentIdentity) -> PathBuf {
        mirror_path(&self.root, identity)
    }

    /// Clone or update the mirror so it reflects the tip of `branch`
    ///
    /// Returns the mirror directory. A branch that is already up to date is success.
    ///
    /// # Errors
    /// Returns `SyncError` when any git step or the mirror directory preparation fails.
    pub async fn ensure_latest(
        &self,
        repo_url: &str,
        branch: &str,
        identity: &DeploymentIdentity,
    ) -> Result<PathBuf, SyncError> {
        let path = self.mirror_path(identity);
        let branch = normalize_branch(branch);
        let span = info_span!(
            "source.sync",
            deployment = %identity,
            repo = %repo_url,
            branch = %branch,
            path = %path.display()
        );

        async {
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|source| SyncError::Io {
                    path: path.clone(),
                    source,
                })?;

            if exists {
                self.update_mirror(&path, branch).await?;
            } else {
                self.clone_mirror(repo_url, branch, &path).await?;
            }

            Ok(path.clone())
        }
        .instrument(span)
        .await
    }

    async fn clone_mirror(&self, repo_url: &str, branch: &str, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        info!("Cloning repository into new mirror");
        let start = Instant::now();
        let result = self.git.clone_branch(repo_url, branch, path).await;
        metrics::record_git_operation("clone", result.is_ok(), start.elapsed().as_secs_f64());

        if let Err(source) = result {
            // A half-written clone would be mistaken for a mirror on the next cycle
            if let Err(e) = tokio::fs::remove_dir_all(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(error = %e, "Failed to remove partial clone");
                }
            }
            return Err(SyncError::Clone {
                url: repo_url.to_string(),
                reference: heads_reference(branch),
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }

    async fn update_mirror(&self, path: &Path, branch: &str) -> Result<(), SyncError> {
        let current = self
            .git
            .current_branch(path)
            .await
            .map_err(|source| SyncError::Switch {
                reference: heads_reference(branch),
                path: path.to_path_buf(),
                source,
            })?;

        if current != branch {
            info!(from = %current, to = %branch, "Mirror is on a different branch, switching");
            let start = Instant::now();
            let result = self.git.switch_branch(path, &self.remote, branch).await;
            metrics::record_git_operation("switch", result.is_ok(), start.elapsed().as_secs_f64());
            result.map_err(|source| SyncError::Switch {
                reference: heads_reference(branch),
                path: path.to_path_buf(),
                source,
            })?;
        }

        debug!("Pulling latest changes");
        let start = Instant::now();
        let result = self.git.pull(path, &self.remote).await;
        metrics::record_git_operation("pull", result.is_ok(), start.elapsed().as_secs_f64());
        result.map_err(|source| SyncError::Pull {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Remove a deployment's mirror; an absent mirror is not an error
    ///
    /// # Errors
    /// Returns `SyncError::Io` if the directory exists but cannot be removed.
    pub async fn delete_mirror(&self, identity: &DeploymentIdentity) -> Result<(), SyncError> {
        let path = self.mirror_path(identity);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(deployment = %identity, path = %path.display(), "Deleted mirror");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SyncError::Io { path, source }),
        }
    }
}

impl std::fmt::Debug for SourceSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSynchronizer")
            .field("root", &self.root)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}
