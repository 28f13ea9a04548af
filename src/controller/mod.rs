//! # Controller
//!
//! Core controller modules for the GitOps Deploy Controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconcile cycles
//! - `source`: Local Git mirrors of each deployment's repository
//! - `manifests`: Manifest discovery, decoding, and application
//! - `reconciler`: The reconcile cycle
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod manifests;
pub mod reconciler;
pub mod server;
pub mod source;
