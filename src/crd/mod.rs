//! # Custom Resource Definitions
//!
//! CRD types for the GitOps Deploy Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification
//! - `status.rs` - Status types for tracking reconciliation state
//! - `identity.rs` - Namespace/name key addressing one deployment

mod identity;
mod spec;
mod status;

// Re-export all public types
pub use identity::DeploymentIdentity;
pub use spec::{GitOpsDeployment, GitOpsDeploymentSpec};
pub use status::{Condition, ConditionStatus, GitOpsDeploymentStatus};
