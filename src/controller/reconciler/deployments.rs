//! # Deployment Store
//!
//! Access to GitOpsDeployment records: lookup, status writes, finalizer updates.

use crate::constants::FIELD_MANAGER;
use crate::crd::{DeploymentIdentity, GitOpsDeployment, GitOpsDeploymentStatus};
use anyhow::Result;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Current record, or `None` when it no longer exists
    async fn get(&self, id: &DeploymentIdentity) -> Result<Option<GitOpsDeployment>>;

    /// Persist the status subresource
    async fn write_status(&self, id: &DeploymentIdentity, status: &GitOpsDeploymentStatus) -> Result<()>;

    /// Replace the finalizer list
    async fn set_finalizers(&self, id: &DeploymentIdentity, finalizers: Vec<String>) -> Result<()>;
}

/// Kubernetes API implementation of [`DeploymentStore`]
#[derive(Clone)]
pub struct KubeDeploymentStore {
    client: Client,
}

impl KubeDeploymentStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, id: &DeploymentIdentity) -> Api<GitOpsDeployment> {
        Api::namespaced(self.client.clone(), &id.namespace)
    }
}

#[async_trait]
impl DeploymentStore for KubeDeploymentStore {
    async fn get(&self, id: &DeploymentIdentity) -> Result<Option<GitOpsDeployment>> {
        Ok(self.api(id).get_opt(&id.name).await?)
    }

    async fn write_status(&self, id: &DeploymentIdentity, status: &GitOpsDeploymentStatus) -> Result<()> {
        let patch = serde_json::json!({
            "status": status
        });
        self.api(id)
            .patch_status(&id.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn set_finalizers(&self, id: &DeploymentIdentity, finalizers: Vec<String>) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": { "finalizers": finalizers }
        });
        self.api(id)
            .patch(&id.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
