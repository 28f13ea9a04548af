//! GitOps Deploy Controller Library
//!
//! Keeps a Kubernetes cluster in step with manifests stored in Git: each
//! `GitOpsDeployment` names a repository, branch and path, and the controller
//! mirrors that branch locally and applies every manifest under the path on an interval.
//!
//! ## Quick Start
//!
//! ```rust
//! use gitops_deploy_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
