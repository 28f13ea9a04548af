//! # Reconcile
//!
//! One reconcile cycle for one GitOpsDeployment:
//! Fetch → Sync → Apply → Report → schedule.
//!
//! - Fetch: a missing record ends the cycle quietly
//! - Sync: clone or pull the mirror; failure reports `CloneFailed`
//! - Apply: upsert every manifest under `<mirror>/<spec.path>`; failure reports `ApplyFailed`
//! - Report: `synced`, `lastSyncTime`, Ready/True/Reconciled, persisted
//! - Schedule: requeue after `spec.interval`; an unparsable interval is a config error

use super::finalize::{finalize, has_finalizer};
use super::status::update_status;
use super::types::{ConfigError, Reconciler, ReconcilerError, TriggerSource};
use super::validation::{parse_interval, validate_spec};
use crate::constants::{
    DEPLOYMENT_FINALIZER, MESSAGE_RECONCILED, REASON_APPLY_FAILED, REASON_CLONE_FAILED,
    REASON_INVALID_SPEC, REASON_RECONCILED,
};
use crate::controller::source::manifests_path;
use crate::crd::{ConditionStatus, DeploymentIdentity, GitOpsDeployment, GitOpsDeploymentStatus};
use crate::observability::metrics;
use chrono::Utc;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Run one reconcile cycle for the deployment `obj` refers to
///
/// # Errors
/// Returns the first failure of the cycle; see [`ReconcilerError`].
pub async fn reconcile(
    obj: Arc<GitOpsDeployment>,
    ctx: Arc<Reconciler>,
    trigger_source: TriggerSource,
) -> Result<Action, ReconcilerError> {
    let id = DeploymentIdentity::of(&obj);
    let span = info_span!(
        "reconcile",
        resource.name = %id.name,
        resource.namespace = %id.namespace,
        trigger_source = trigger_source.as_str()
    );

    async move {
        metrics::increment_reconciliations();
        let start = Instant::now();
        let result = reconcile_identity(&id, &ctx).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_identity(id: &DeploymentIdentity, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let Some(deployment) = ctx
        .deployments
        .get(id)
        .await
        .map_err(ReconcilerError::Lookup)?
    else {
        info!("Deployment no longer exists, nothing to do");
        ctx.forget(id);
        return Ok(Action::await_change());
    };

    if deployment.metadata.deletion_timestamp.is_some() {
        return finalize(&deployment, id, ctx).await;
    }

    if ctx.config.finalizer_enabled && !has_finalizer(&deployment) {
        let mut finalizers = deployment.metadata.finalizers.clone().unwrap_or_default();
        finalizers.push(DEPLOYMENT_FINALIZER.to_string());
        ctx.deployments
            .set_finalizers(id, finalizers)
            .await
            .map_err(ReconcilerError::Persist)?;
        debug!(finalizer = DEPLOYMENT_FINALIZER, "Added finalizer");
    }

    sync_and_apply(&deployment, id, ctx).await
}

async fn sync_and_apply(
    deployment: &GitOpsDeployment,
    id: &DeploymentIdentity,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let spec = &deployment.spec;
    let mut status = deployment.status.clone().unwrap_or_default();

    if let Err(reason) = validate_spec(spec) {
        report_failure(ctx, id, &mut status, REASON_INVALID_SPEC, &reason).await;
        return Err(ConfigError::Spec(reason).into());
    }

    let local_path = match ctx.source.ensure_latest(&spec.repo_url, &spec.branch, id).await {
        Ok(path) => path,
        Err(e) => {
            report_failure(ctx, id, &mut status, REASON_CLONE_FAILED, &e.to_string()).await;
            return Err(e.into());
        }
    };

    let manifests = manifests_path(&local_path, &spec.path);
    let summary = match ctx.applier.apply_all(&manifests).await {
        Ok(summary) => summary,
        Err(e) => {
            report_failure(ctx, id, &mut status, REASON_APPLY_FAILED, &e.to_string()).await;
            return Err(e.into());
        }
    };

    status.synced = true;
    status.last_sync_time = Some(Utc::now().to_rfc3339());
    status.observed_generation = deployment.metadata.generation;
    update_status(&mut status, ConditionStatus::True, REASON_RECONCILED, MESSAGE_RECONCILED);
    ctx.deployments
        .write_status(id, &status)
        .await
        .map_err(ReconcilerError::Persist)?;
    ctx.reset_backoff(id);

    let interval = parse_interval(&spec.interval).map_err(|e| {
        metrics::increment_duration_parsing_errors();
        ConfigError::Interval(e)
    })?;

    ctx.schedule(id, deployment.metadata.generation, Some(interval), TriggerSource::TimerBased);
    metrics::increment_requeues(TriggerSource::TimerBased.as_str());
    info!(
        objects = summary.objects(),
        created = summary.created,
        updated = summary.updated,
        requeue_after_secs = interval.as_secs(),
        "Reconciled"
    );
    Ok(Action::requeue(interval))
}

/// Record a failed cycle on the status; persisting it is best-effort
async fn report_failure(
    ctx: &Reconciler,
    id: &DeploymentIdentity,
    status: &mut GitOpsDeploymentStatus,
    reason: &str,
    message: &str,
) {
    status.synced = false;
    update_status(status, ConditionStatus::False, reason, message);
    if let Err(e) = ctx.deployments.write_status(id, status).await {
        warn!(reason, error = %e, "Failed to persist failure status");
    }
}
