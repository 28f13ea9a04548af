//! # Deployment Identity
//!
//! The namespace/name key of one GitOpsDeployment. Keys the local mirror, the
//! backoff state, and the schedule memory.

use super::GitOpsDeployment;
use kube::ResourceExt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentIdentity {
    pub namespace: String,
    pub name: String,
}

impl DeploymentIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a deployment object; a missing namespace maps to `default`
    #[must_use]
    pub fn of(deployment: &GitOpsDeployment) -> Self {
        Self::new(
            deployment
                .namespace()
                .unwrap_or_else(|| "default".to_string()),
            deployment.name_any(),
        )
    }
}

impl std::fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
