//! # Observability
//!
//! Prometheus metrics collection. Logging is configured in `runtime::initialization`.

pub mod metrics;
