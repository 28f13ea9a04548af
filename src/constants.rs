//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default root directory under which one mirror per deployment is kept
/// Cluster owners can mount a PVC at this path for persistent storage
pub const DEFAULT_MIRROR_ROOT: &str = "/tmp/gitops";

/// Remote every mirror pulls from
pub const DEFAULT_GIT_REMOTE: &str = "origin";

/// Default upper bound for a single git invocation (seconds, 0 disables)
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 300;

/// Namespace every manifest object is written to, regardless of its own namespace field
pub const TARGET_NAMESPACE: &str = "default";

/// Only files with exactly this extension are treated as manifests
pub const MANIFEST_EXTENSION: &str = "yaml";

/// Finalizer marker gating the Terminating phase
pub const DEPLOYMENT_FINALIZER: &str = "gitops.example.com/finalizer";

/// Field manager name used for status writes
pub const FIELD_MANAGER: &str = "gitops-deploy-controller";

/// Condition type maintained on every GitOpsDeployment
pub const CONDITION_READY: &str = "Ready";

/// Condition reasons written by the reconciler
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_CLONE_FAILED: &str = "CloneFailed";
pub const REASON_APPLY_FAILED: &str = "ApplyFailed";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// Message written with the Reconciled reason
pub const MESSAGE_RECONCILED: &str = "Successfully applied manifests";

/// Fibonacci error backoff bounds (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default maximum number of concurrently running reconcile cycles
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Tolerance when deciding whether a remembered next-run time has arrived (seconds)
pub const SCHEDULE_TOLERANCE_SECS: i64 = 2;
