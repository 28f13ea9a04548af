//! # Runtime
//!
//! Process-level plumbing around the reconciler.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server, Kubernetes client
//! - `watch_loop`: the `kube_runtime::Controller` loop and its admission gate
//! - `error_policy`: backoff for failed cycles and watch stream errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
