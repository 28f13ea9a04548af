//! # Reconciler
//!
//! Reconcile cycle for GitOpsDeployment resources.
//!
//! ## Module Structure
//!
//! - `types.rs` - Reconciler context, errors, trigger sources, schedule memory
//! - `deployments.rs` - Access to GitOpsDeployment records
//! - `reconcile.rs` - The Fetch → Sync → Apply → Report cycle
//! - `finalize.rs` - Terminating phase behind the finalizer
//! - `status.rs` - Ready condition construction
//! - `validation/` - Spec checks and interval parsing

mod deployments;
mod finalize;
mod reconcile;
mod status;
mod types;
pub mod validation;

pub use deployments::{DeploymentStore, KubeDeploymentStore};
pub use finalize::has_finalizer;
pub use reconcile::reconcile;
pub use status::{update_status, update_status_at};
pub use types::{
    Admission, BackoffState, ConfigError, Reconciler, ReconcilerError, ScheduleEntry,
    TriggerSource,
};
