//! # Error Handling Tests
//!
//! The error policy applied after a failed cycle: Fibonacci backoff for transient
//! failures, parking for config errors, and reset after success.

mod common;

use common::{deployment, Harness};
use gitops_deploy_controller::prelude::*;
use gitops_deploy_controller::runtime::error_policy::{forget_deleted, handle_reconciliation_error};
use kube_runtime::controller::Action;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn transient() -> ReconcilerError {
    ReconcilerError::Lookup(anyhow::anyhow!("connection refused"))
}

#[test]
fn test_transient_errors_back_off_fibonacci() {
    let h = Harness::new(false);
    let web = Arc::new(deployment("web", "1m"));

    let delays: Vec<Action> = (0..5)
        .map(|_| handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler)))
        .collect();

    let expected: Vec<Action> = [60, 60, 120, 180, 300]
        .into_iter()
        .map(|s| Action::requeue(Duration::from_secs(s)))
        .collect();
    assert_eq!(delays, expected);
}

#[test]
fn test_backoff_is_tracked_per_deployment() {
    let h = Harness::new(false);
    let web = Arc::new(deployment("web", "1m"));
    let api = Arc::new(deployment("api", "1m"));

    handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));
    handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));
    let web_third = handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));
    let api_first = handle_reconciliation_error(api, &transient(), Arc::clone(&h.reconciler));

    assert_eq!(web_third, Action::requeue(Duration::from_secs(120)));
    assert_eq!(api_first, Action::requeue(Duration::from_secs(60)));
}

#[test]
fn test_error_backoff_is_admitted_when_due() {
    let h = Harness::new(false);
    let web = Arc::new(deployment("web", "1m"));

    handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));

    assert!(matches!(
        h.reconciler.admit(&web, chrono::Utc::now()),
        Admission::Skip(_)
    ));
    let due = chrono::Utc::now() + chrono::Duration::seconds(60);
    assert_eq!(
        h.reconciler.admit(&web, due),
        Admission::Run(TriggerSource::ErrorBackoff)
    );
}

#[test]
fn test_config_error_parks_until_spec_changes() {
    let h = Harness::new(false);
    let mut web = deployment("web", "abc");
    let error = ReconcilerError::Config(ConfigError::Spec("branch cannot be empty".to_string()));

    let action = handle_reconciliation_error(Arc::new(web.clone()), &error, Arc::clone(&h.reconciler));

    assert_eq!(action, Action::await_change());
    let far_future = chrono::Utc::now() + chrono::Duration::days(365);
    assert_eq!(
        h.reconciler.admit(&web, far_future),
        Admission::Skip(Action::await_change())
    );

    web.metadata.generation = Some(2);
    assert_eq!(
        h.reconciler.admit(&web, chrono::Utc::now()),
        Admission::Run(TriggerSource::SpecChange)
    );
}

#[test]
fn test_deleted_deployment_state_is_released() {
    let h = Harness::new(false);
    let web = Arc::new(deployment("web", "1m"));
    let api = Arc::new(deployment("api", "1m"));
    handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));
    handle_reconciliation_error(Arc::clone(&web), &transient(), Arc::clone(&h.reconciler));
    handle_reconciliation_error(Arc::clone(&api), &transient(), Arc::clone(&h.reconciler));

    forget_deleted(&h.reconciler, Some("default"), "web");

    assert_eq!(h.reconciler.schedules.lock().unwrap().len(), 1);
    assert_eq!(h.reconciler.backoff_states.lock().unwrap().len(), 1);
    assert_eq!(
        h.reconciler.admit(&web, chrono::Utc::now()),
        Admission::Run(TriggerSource::FirstSeen)
    );
    assert!(matches!(
        h.reconciler.admit(&api, chrono::Utc::now()),
        Admission::Skip(_)
    ));
    // A recreated deployment starts its backoff over
    assert_eq!(
        handle_reconciliation_error(web, &transient(), Arc::clone(&h.reconciler)),
        Action::requeue(Duration::from_secs(60))
    );
}

#[tokio::test]
async fn test_success_resets_backoff() {
    let h = Harness::new(false);
    let web = deployment("web", "1m");
    h.deployments.insert(web.clone());
    let shared = Arc::new(web.clone());

    h.deployments.fail_status_writes.store(true, Ordering::SeqCst);
    let err = h.cycle(&web).await.unwrap_err();
    assert_eq!(
        handle_reconciliation_error(Arc::clone(&shared), &err, Arc::clone(&h.reconciler)),
        Action::requeue(Duration::from_secs(60))
    );
    let err = h.cycle(&web).await.unwrap_err();
    assert_eq!(
        handle_reconciliation_error(Arc::clone(&shared), &err, Arc::clone(&h.reconciler)),
        Action::requeue(Duration::from_secs(60))
    );

    h.deployments.fail_status_writes.store(false, Ordering::SeqCst);
    h.cycle(&web).await.unwrap();

    h.deployments.fail_status_writes.store(true, Ordering::SeqCst);
    let err = h.cycle(&web).await.unwrap_err();
    assert_eq!(
        handle_reconciliation_error(shared, &err, Arc::clone(&h.reconciler)),
        Action::requeue(Duration::from_secs(60))
    );
}

#[test]
fn test_error_reasons_are_stable_metric_labels() {
    assert_eq!(transient().reason(), "lookup");
    assert_eq!(
        ReconcilerError::Config(ConfigError::Spec(String::new())).reason(),
        "config"
    );
    assert!(!transient().is_config());
}
