//! # Types
//!
//! Core types for the reconciler.

use super::deployments::{DeploymentStore, KubeDeploymentStore};
use super::validation::DurationError;
use crate::config::SharedControllerConfig;
use crate::constants::SCHEDULE_TOLERANCE_SECS;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::manifests::{ApplyError, KubeResourceStore, ManifestApplier};
use crate::controller::source::{GitCli, SourceSynchronizer, SyncError};
use crate::crd::{DeploymentIdentity, GitOpsDeployment};
use chrono::{DateTime, Utc};
use kube::Client;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Problems with a deployment's own configuration; retried only after the spec changes
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid interval: {0}")]
    Interval(#[from] DurationError),
    #[error("invalid spec: {0}")]
    Spec(String),
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to load deployment: {0}")]
    Lookup(#[source] anyhow::Error),
    #[error("source sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("manifest apply failed: {0}")]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to persist status: {0}")]
    Persist(#[source] anyhow::Error),
    #[error("finalization failed: {0}")]
    Finalize(#[source] anyhow::Error),
}

impl ReconcilerError {
    /// Metric label for the failure
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Lookup(_) => "lookup",
            ReconcilerError::Sync(_) => "sync",
            ReconcilerError::Apply(_) => "apply",
            ReconcilerError::Config(_) => "config",
            ReconcilerError::Persist(_) => "persist",
            ReconcilerError::Finalize(_) => "finalize",
        }
    }

    /// Config errors cannot succeed until the spec changes
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, ReconcilerError::Config(_))
    }
}

/// Why a reconcile cycle was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// First time this process sees the deployment
    FirstSeen,
    /// Generation changed since the last cycle
    SpecChange,
    /// Deletion timestamp set
    Deletion,
    /// Interval elapsed after a successful cycle
    TimerBased,
    /// Backoff elapsed after a failed cycle
    ErrorBackoff,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::FirstSeen => "first-seen",
            TriggerSource::SpecChange => "spec-change",
            TriggerSource::Deletion => "deletion",
            TriggerSource::TimerBased => "timer-based",
            TriggerSource::ErrorBackoff => "error-backoff",
        }
    }
}

/// Backoff state for a specific deployment
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// When the next cycle for a deployment is due
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// Generation the last cycle acted on
    pub generation: Option<i64>,
    /// Earliest time the next timer/backoff cycle may run; `None` waits for a spec change
    pub not_before: Option<DateTime<Utc>>,
    /// What the pending wait is for
    pub pending: TriggerSource,
}

/// Gate decision for one trigger
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Run(TriggerSource),
    Skip(Action),
}

/// Shared reconcile context
pub struct Reconciler {
    pub deployments: Arc<dyn DeploymentStore>,
    pub source: SourceSynchronizer,
    pub applier: ManifestApplier,
    pub config: SharedControllerConfig,
    // Backoff state per deployment, driven by the error policy
    pub backoff_states: Mutex<HashMap<DeploymentIdentity, BackoffState>>,
    // Next due cycle per deployment; in memory only, so a restart reconciles everything once
    pub schedules: Mutex<HashMap<DeploymentIdentity, ScheduleEntry>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("source", &self.source)
            .field("applier", &self.applier)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        deployments: Arc<dyn DeploymentStore>,
        source: SourceSynchronizer,
        applier: ManifestApplier,
        config: SharedControllerConfig,
    ) -> Self {
        Self {
            deployments,
            source,
            applier,
            config,
            backoff_states: Mutex::new(HashMap::new()),
            schedules: Mutex::new(HashMap::new()),
        }
    }

    /// Context backed by the cluster and the `git` command line
    #[must_use]
    pub fn from_client(client: Client, config: SharedControllerConfig) -> Self {
        let git = Arc::new(GitCli::new(config.git_timeout()));
        let source = SourceSynchronizer::new(config.mirror_root.clone(), config.git_remote.clone(), git);
        let applier = ManifestApplier::new(Arc::new(KubeResourceStore::new(client.clone())));
        Self::new(Arc::new(KubeDeploymentStore::new(client)), source, applier, config)
    }

    /// Decide whether a trigger should start a cycle
    ///
    /// Runs on deletion, on first sight, on a generation change, and once the
    /// remembered next-run time has arrived (within a small tolerance). Anything else
    /// is an echo of the controller's own status write and is skipped, re-arming the
    /// remaining wait.
    #[must_use]
    pub fn admit(&self, deployment: &GitOpsDeployment, now: DateTime<Utc>) -> Admission {
        if deployment.metadata.deletion_timestamp.is_some() {
            return Admission::Run(TriggerSource::Deletion);
        }

        let id = DeploymentIdentity::of(deployment);
        let entry = match self.schedules.lock() {
            Ok(schedules) => schedules.get(&id).cloned(),
            Err(e) => {
                warn!(error = %e, "Failed to lock schedules, admitting cycle");
                None
            }
        };
        let Some(entry) = entry else {
            return Admission::Run(TriggerSource::FirstSeen);
        };

        if entry.generation != deployment.metadata.generation {
            return Admission::Run(TriggerSource::SpecChange);
        }

        match entry.not_before {
            None => Admission::Skip(Action::await_change()),
            Some(due) => {
                let tolerance = chrono::Duration::seconds(SCHEDULE_TOLERANCE_SECS);
                if now >= due - tolerance {
                    Admission::Run(entry.pending)
                } else {
                    let remaining = (due - now).to_std().unwrap_or(Duration::ZERO);
                    Admission::Skip(Action::requeue(remaining))
                }
            }
        }
    }

    /// Remember when the next cycle for `id` is due
    pub fn schedule(
        &self,
        id: &DeploymentIdentity,
        generation: Option<i64>,
        after: Option<Duration>,
        pending: TriggerSource,
    ) {
        let not_before = after.map(|d| {
            chrono::Duration::from_std(d)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        if let Ok(mut schedules) = self.schedules.lock() {
            schedules.insert(
                id.clone(),
                ScheduleEntry {
                    generation,
                    not_before,
                    pending,
                },
            );
        }
    }

    /// Next error backoff for `id`; advances its sequence
    pub fn next_backoff(&self, id: &DeploymentIdentity) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(id.clone()).or_insert_with(|| {
                    BackoffState::new(self.config.backoff_min_minutes, self.config.backoff_max_minutes)
                });
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to lock backoff_states, using minimum backoff");
                (Duration::from_secs(self.config.backoff_min_minutes * 60), 0)
            }
        }
    }

    pub fn reset_backoff(&self, id: &DeploymentIdentity) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(id) {
                state.reset();
            }
        }
    }

    /// Drop all in-memory state for a deployment that is gone
    pub fn forget(&self, id: &DeploymentIdentity) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(id);
        }
        if let Ok(mut schedules) = self.schedules.lock() {
            schedules.remove(id);
        }
    }
}
