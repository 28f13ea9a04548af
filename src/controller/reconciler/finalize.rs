//! # Finalization
//!
//! Terminating phase of a deployment's lifecycle (`Active → Terminating → Gone`).
//!
//! Only a deployment carrying the controller's finalizer is finalized: its manifest
//! objects are deleted, its mirror is removed, then the finalizer is released so the
//! API server can complete the deletion. The finalizer is added only when
//! `ENABLE_FINALIZER` is set, but one already present is always honoured.

use super::types::{Reconciler, ReconcilerError};
use crate::constants::DEPLOYMENT_FINALIZER;
use crate::controller::source::manifests_path;
use crate::crd::{DeploymentIdentity, GitOpsDeployment};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

#[must_use]
pub fn has_finalizer(deployment: &GitOpsDeployment) -> bool {
    deployment
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == DEPLOYMENT_FINALIZER))
}

/// Delete everything the deployment applied, drop its mirror, release the finalizer
///
/// # Errors
/// Returns `Finalize` if the objects or mirror cannot be removed and `Persist` if the
/// finalizer cannot be released; the finalizer stays in place so the phase is retried.
pub async fn finalize(
    deployment: &GitOpsDeployment,
    id: &DeploymentIdentity,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    if !has_finalizer(deployment) {
        debug!("Deployment is being deleted without our finalizer, nothing to clean up");
        ctx.forget(id);
        return Ok(Action::await_change());
    }

    info!("Finalizing deployment");
    let mirror = ctx.source.mirror_path(id);
    let mirror_exists = tokio::fs::try_exists(&mirror)
        .await
        .map_err(|e| ReconcilerError::Finalize(e.into()))?;

    if mirror_exists {
        let manifests = manifests_path(&mirror, &deployment.spec.path);
        let summary = ctx
            .applier
            .delete_all(&manifests)
            .await
            .map_err(|e| ReconcilerError::Finalize(e.into()))?;
        info!(
            deleted = summary.deleted,
            already_absent = summary.already_absent,
            "Deleted applied objects"
        );
    } else {
        warn!(path = %mirror.display(), "No local mirror, cannot enumerate applied objects");
    }

    ctx.source
        .delete_mirror(id)
        .await
        .map_err(|e| ReconcilerError::Finalize(e.into()))?;

    let remaining: Vec<String> = deployment
        .metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|name| name.as_str() != DEPLOYMENT_FINALIZER)
        .cloned()
        .collect();
    ctx.deployments
        .set_finalizers(id, remaining)
        .await
        .map_err(ReconcilerError::Persist)?;

    ctx.forget(id);
    info!("Finalizer released");
    Ok(Action::await_change())
}
