//! # GitOpsDeployment Spec
//!
//! Main CRD specification type.

use serde::{Deserialize, Serialize};

/// GitOpsDeployment Custom Resource Definition
///
/// Declares a Git repository, a branch, and a directory of manifests inside it that the
/// controller keeps applied to the cluster, re-checking every `interval`.
///
/// # Example
///
/// ```yaml
/// apiVersion: gitops.example.com/v1alpha1
/// kind: GitOpsDeployment
/// metadata:
///   name: my-app
///   namespace: default
/// spec:
///   repoURL: https://example.com/repo.git
///   branch: main
///   path: manifests
///   interval: 1m
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GitOpsDeployment",
    group = "gitops.example.com",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::GitOpsDeploymentStatus",
    shortname = "gitops",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}, {"name":"Last Sync", "type":"string", "jsonPath":".status.lastSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentSpec {
    /// Git repository URL to clone (https, ssh, or file)
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    /// Branch to track
    /// A `refs/heads/` prefix is accepted and stripped
    pub branch: String,
    /// Directory inside the repository holding the manifests
    /// Every `.yaml` file below it is applied
    pub path: String,
    /// How often to re-sync the repository and re-apply manifests
    /// Format: Go-style duration string (e.g., "30s", "1m", "1h30m")
    pub interval: String,
}
