//! # Watch Loop
//!
//! Watches GitOpsDeployment resources in every namespace and drives reconcile
//! cycles through `kube_runtime::Controller`, which guarantees at most one in-flight
//! cycle per deployment. The stream is restarted after watch errors until shutdown.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{reconcile, Admission, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::{DeploymentIdentity, GitOpsDeployment};
use crate::runtime::error_policy::{
    forget_deleted, handle_reconciliation_error, handle_watch_stream_error,
};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::controller::{self, Action, Error as ControllerError};
use kube_runtime::{watcher, Controller};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Run the controller until a shutdown signal arrives
///
/// # Errors
/// Currently always returns `Ok`; the signature leaves room for fatal start-up failures.
pub async fn run_watch_loop(
    deployments: Api<GitOpsDeployment>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_duration_ms = Arc::new(AtomicU64::new(controller_config.watch_backoff_start_ms));

    // Flip readiness first so traffic drains while in-flight cycles finish
    watch_for_shutdown(server_state.clone(), shutdown_signal());

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );
        info!(
            concurrency = controller_config.max_concurrent_reconciliations,
            "Starting controller watch loop..."
        );

        let backoff = backoff_duration_ms.clone();
        let config = controller_config.clone();
        let pruned = reconciler.clone();
        Controller::new(deployments.clone(), watcher::Config::default().any_semantic())
            .with_config(
                controller::Config::default()
                    .concurrency(controller_config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(create_reconcile_fn, handle_reconciliation_error, reconciler.clone())
            .filter_map(move |x| {
                let backoff = backoff.clone();
                let config = config.clone();
                let pruned = pruned.clone();
                async move {
                    match &x {
                        Ok(_) => {
                            backoff.store(config.watch_backoff_start_ms, Ordering::Relaxed);
                            debug!("watch.event.success");
                            Some(x)
                        }
                        Err(e) => {
                            if let ControllerError::ObjectNotFound(obj_ref) = e {
                                forget_deleted(&pruned, obj_ref.namespace.as_deref(), &obj_ref.name);
                            }
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                config.watch_backoff_max_ms,
                                config.watch_restart_delay_secs,
                            )
                            .await
                            .map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Mark the controller not-ready once `signal` resolves
fn watch_for_shutdown<F>(state: Arc<ServerState>, signal: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        state.set_ready(false);
    })
}

/// Resolves on SIGINT, or on SIGTERM where the platform has it
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => debug!(signal = "SIGINT", "shutdown.signal"),
        () = terminate => debug!(signal = "SIGTERM", "shutdown.signal"),
    }
}

/// Gate each trigger through the reconciler's schedule memory before running a cycle
fn create_reconcile_fn(
    obj: Arc<GitOpsDeployment>,
    ctx: Arc<Reconciler>,
) -> impl std::future::Future<Output = Result<Action, ReconcilerError>> + Send {
    async move {
        let id = DeploymentIdentity::of(&obj);
        match ctx.admit(&obj, chrono::Utc::now()) {
            Admission::Skip(action) => {
                debug!(
                    resource = %id,
                    generation = obj.metadata.generation,
                    action = ?action,
                    "Skipping trigger - spec unchanged and next cycle not yet due"
                );
                Ok(action)
            }
            Admission::Run(trigger_source) => {
                debug!(
                    resource = %id,
                    trigger_source = trigger_source.as_str(),
                    "watch.event.received"
                );
                let result = reconcile(obj, ctx, trigger_source).await;
                if let Err(e) = &result {
                    error!(resource = %id, error = %e, "watch.event.reconciliation_failed");
                }
                result
            }
        }
    }
}
