//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `gitops_reconciliations_total` - Total number of reconcile cycles
//! - `gitops_reconciliation_errors_total{reason}` - Failed cycles by failure reason
//! - `gitops_reconciliation_duration_seconds` - Duration of reconcile cycles
//! - `gitops_objects_applied_total{outcome}` - Manifest objects created or updated
//! - `gitops_objects_deleted_total` - Manifest objects deleted during finalization
//! - `gitops_git_operations_total{operation,result}` - Git clone/switch/pull invocations
//! - `gitops_git_operation_duration_seconds{operation}` - Duration of git operations
//! - `gitops_requeues_total{trigger}` - Requeues scheduled, by what triggered them
//! - `gitops_duration_parsing_errors_total` - Intervals that failed to parse

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitops_reconciliations_total",
        "Total number of reconcile cycles",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gitops_reconciliation_errors_total",
            "Total number of failed reconcile cycles",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "gitops_reconciliation_duration_seconds",
            "Duration of reconcile cycles in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static OBJECTS_APPLIED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gitops_objects_applied_total",
            "Total number of manifest objects written to the cluster",
        ),
        &["outcome"],
    )
    .expect("Failed to create OBJECTS_APPLIED_TOTAL metric - this should never happen")
});

static OBJECTS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitops_objects_deleted_total",
        "Total number of manifest objects deleted during finalization",
    )
    .expect("Failed to create OBJECTS_DELETED_TOTAL metric - this should never happen")
});

static GIT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gitops_git_operations_total",
            "Total number of git operations",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create GIT_OPERATIONS_TOTAL metric - this should never happen")
});

static GIT_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gitops_git_operation_duration_seconds",
            "Duration of git operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["operation"],
    )
    .expect("Failed to create GIT_OPERATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("gitops_requeues_total", "Total number of requeues scheduled"),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static DURATION_PARSING_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitops_duration_parsing_errors_total",
        "Total number of interval values that failed to parse",
    )
    .expect("Failed to create DURATION_PARSING_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the process registry
///
/// # Errors
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(OBJECTS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBJECTS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DURATION_PARSING_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_objects_applied(outcome: &str) {
    OBJECTS_APPLIED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_objects_deleted() {
    OBJECTS_DELETED_TOTAL.inc();
}

/// Record one git operation with its outcome and duration
pub fn record_git_operation(operation: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    GIT_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    GIT_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_requeues(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_duration_parsing_errors() {
    DURATION_PARSING_ERRORS_TOTAL.inc();
}

/// Render every registered metric in the Prometheus text format
#[must_use]
pub fn gather_text() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
