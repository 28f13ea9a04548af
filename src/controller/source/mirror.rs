//! # Local Mirror Paths
//!
//! Pure path functions for the on-disk mirror of each deployment's repository.

use crate::crd::DeploymentIdentity;
use std::path::{Component, Path, PathBuf};

/// Sanitize a string for use in filesystem paths
/// Replaces characters that are problematic in filenames with safe alternatives
pub(crate) fn sanitize_path_component(s: &str) -> String {
    s.replace(['@', '/', ':', '\\', ' ', '\t', '\n', '\r'], "-")
        .replace("..", "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// Mirror directory for a deployment: `<root>/<namespace>/<name>`
#[must_use]
pub fn mirror_path(root: &Path, identity: &DeploymentIdentity) -> PathBuf {
    root.join(sanitize_path_component(&identity.namespace))
        .join(sanitize_path_component(&identity.name))
}

/// Join the manifest sub-path onto a mirror directory
///
/// Root and `.` components of `sub_path` are dropped so the result stays below `local_path`.
/// `..` components are rejected earlier by spec validation.
#[must_use]
pub fn manifests_path(local_path: &Path, sub_path: &str) -> PathBuf {
    Path::new(sub_path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .fold(local_path.to_path_buf(), |acc, c| acc.join(c))
}

/// Branch name without a `refs/heads/` prefix
#[must_use]
pub fn normalize_branch(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

/// Heads-namespaced reference for a branch name
#[must_use]
pub fn heads_reference(branch: &str) -> String {
    format!("refs/heads/{}", normalize_branch(branch))
}
