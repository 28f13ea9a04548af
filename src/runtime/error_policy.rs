//! # Error Policy
//!
//! Error handling and backoff for the controller watch loop: failed reconcile
//! cycles and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError, TriggerSource};
use crate::crd::{DeploymentIdentity, GitOpsDeployment};
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle a failed reconcile cycle
///
/// Config errors park the deployment until its spec changes. Every other error is
/// retried after the deployment's next Fibonacci backoff delay.
pub fn handle_reconciliation_error(
    obj: Arc<GitOpsDeployment>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let id = DeploymentIdentity::of(&obj);
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %id.name,
        resource.namespace = %id.namespace,
        error.reason = error.reason()
    );
    let _error_guard = error_span.enter();

    error!(error = %error, "Reconciliation failed");
    metrics::increment_reconciliation_errors(error.reason());

    if error.is_config() {
        ctx.schedule(&id, obj.metadata.generation, None, TriggerSource::SpecChange);
        warn!("Not rescheduling until the deployment spec changes");
        return Action::await_change();
    }

    let (delay, error_count) = ctx.next_backoff(&id);
    ctx.schedule(
        &id,
        obj.metadata.generation,
        Some(delay),
        TriggerSource::ErrorBackoff,
    );
    info!(
        backoff_secs = delay.as_secs(),
        error_count,
        trigger_source = TriggerSource::ErrorBackoff.as_str(),
        "Retrying with Fibonacci backoff"
    );
    metrics::increment_requeues(TriggerSource::ErrorBackoff.as_str());
    Action::requeue(delay)
}

/// Drop schedule and backoff memory for a deployment the watch reports as gone
///
/// Deployments deleted without a finalizer never reach reconcile again, so this is
/// the only point where their entries can be released.
pub fn forget_deleted(ctx: &Reconciler, namespace: Option<&str>, name: &str) {
    let id = DeploymentIdentity::new(namespace.unwrap_or_default(), name);
    ctx.forget(&id);
    debug!(resource = %id, "Released admission state for deleted deployment");
}

/// Class of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

/// Classify a watch stream error from its debug rendering
///
/// 404 is checked before 401 because a plain-text 404 body can surface inside a
/// `WatchFailed` chain that also mentions authorization.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    if error_string.contains("401") || error_string.contains("Unauthorized") {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::Throttled;
    }
    WatchErrorKind::Other
}

/// Handle a watch stream error
///
/// Returns `None` to drop the event and let the watch restart, or `Some(())` to keep going.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized); check the controller's ServiceAccount, ClusterRole and ClusterRoleBinding"
            );
            warn!(
                "Waiting {}s before retrying watch (RBAC may need time to propagate)",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
            None
        }
        WatchErrorKind::Throttled => {
            let current = backoff.load(Ordering::Relaxed);
            warn!(
                "API server throttling or reinitializing (429), backing off for {}ms",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404); expected if a deployment was deleted, otherwise check the GitOpsDeployment CRD is installed: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_error() {
        assert_eq!(
            classify_watch_error("ApiError: Unauthorized (401)"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("WatchFailed: too old resource version"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::Throttled
        );
        assert_eq!(
            classify_watch_error("WatchFailed: invalid type: integer `404`, Unauthorized"),
            WatchErrorKind::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_backoff_doubles_to_cap() {
        let backoff = Arc::new(AtomicU64::new(1000));
        assert!(handle_watch_stream_error("429 TooManyRequests", &backoff, 3000, 1)
            .await
            .is_none());
        assert_eq!(backoff.load(Ordering::Relaxed), 2000);
        handle_watch_stream_error("429", &backoff, 3000, 1).await;
        assert_eq!(backoff.load(Ordering::Relaxed), 3000);
    }

    #[tokio::test]
    async fn test_not_found_keeps_stream() {
        let backoff = Arc::new(AtomicU64::new(1000));
        assert!(handle_watch_stream_error("ObjectNotFound", &backoff, 3000, 0)
            .await
            .is_some());
    }
}
