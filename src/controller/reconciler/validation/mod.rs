//! # Validation
//!
//! Checks a GitOpsDeployment spec before a cycle touches git or the cluster, and
//! parses reconcile intervals.

mod duration;

pub use duration::{parse_interval, DurationError};

use crate::crd::GitOpsDeploymentSpec;
use std::path::{Component, Path};

/// Validate the fields a cycle depends on
///
/// `repoURL` and `branch` must be non-empty and `path` must not climb out of the
/// mirror with `..` components. The interval is checked separately, after apply.
///
/// # Errors
/// Returns a human-readable description of the first invalid field.
pub fn validate_spec(spec: &GitOpsDeploymentSpec) -> Result<(), String> {
    if spec.repo_url.trim().is_empty() {
        return Err("repoURL cannot be empty".to_string());
    }
    if spec.branch.trim().is_empty() {
        return Err("branch cannot be empty".to_string());
    }
    if spec.path.contains('\0') || spec.path.chars().any(char::is_control) {
        return Err(format!("path '{}' contains control characters", spec.path));
    }
    if Path::new(&spec.path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(format!("path '{}' must not contain '..'", spec.path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(repo_url: &str, branch: &str, path: &str) -> GitOpsDeploymentSpec {
        GitOpsDeploymentSpec {
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
            interval: "1m".to_string(),
        }
    }

    #[test]
    fn test_valid_spec() {
        assert!(validate_spec(&spec("https://example.com/repo.git", "main", "manifests")).is_ok());
        assert!(validate_spec(&spec("https://example.com/repo.git", "main", "")).is_ok());
        assert!(validate_spec(&spec("git@example.com:org/repo.git", "main", "./a/b")).is_ok());
    }

    #[test]
    fn test_missing_repo_or_branch() {
        let err = validate_spec(&spec("", "main", "manifests")).unwrap_err();
        assert!(err.contains("repoURL"));
        let err = validate_spec(&spec("https://example.com/repo.git", " ", "manifests")).unwrap_err();
        assert!(err.contains("branch"));
    }

    #[test]
    fn test_parent_dir_in_path_rejected() {
        assert!(validate_spec(&spec("https://example.com/repo.git", "main", "../etc")).is_err());
        assert!(validate_spec(&spec("https://example.com/repo.git", "main", "a/../../b")).is_err());
        assert!(validate_spec(&spec("https://example.com/repo.git", "main", "a..b")).is_ok());
    }
}
