//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use gitops_deploy_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - CRD types (GitOpsDeployment, GitOpsDeploymentStatus, etc.)
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - The seams the reconciler is built on (GitClient, ResourceStore, DeploymentStore)
//! - Config types (ControllerConfig, ServerConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    has_finalizer, reconcile, Admission, BackoffState, ConfigError, DeploymentStore,
    KubeDeploymentStore, Reconciler, ReconcilerError, TriggerSource,
};

// Source mirroring and manifest application
pub use crate::controller::manifests::{
    ApplyError, ApplySummary, DeleteSummary, KubeResourceStore, ManifestApplier, ManifestObject,
    ObjectKey, ResourceStore, StoreError, UpsertOutcome,
};
pub use crate::controller::source::{GitCli, GitClient, GitError, SourceSynchronizer, SyncError};

// Config types - for configuration management
pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
