//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `gcs_bucket_operator_reconciliations_total` - Total number of reconciliations
//! - `gcs_bucket_operator_reconciliation_errors_total` - Total number of reconciliation errors
//! - `gcs_bucket_operator_reconciliation_duration_seconds` - Duration of reconciliations
//! - `gcs_bucket_operator_requeues_total` - Requeues by reason
//! - `gcs_bucket_operator_transitions_total` - State machine transitions by step
//! - `gcs_bucket_operator_buckets_created_total` - Buckets created in GCS
//! - `gcs_bucket_operator_buckets_deleted_total` - Buckets deleted from GCS
//! - `gcs_bucket_operator_binding_drift_total` - Reconciliations halted by a forbidden binding change
//! - `gcs_bucket_operator_ownership_violations_total` - Deletions refused because the bucket is not owned
//! - `gcs_bucket_operator_provider_operations_total` - Provider calls by operation
//! - `gcs_bucket_operator_provider_operation_errors_total` - Failed provider calls by operation
//! - `gcs_bucket_operator_provider_operation_duration_seconds` - Provider call latency by operation

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "gcs_bucket_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcs_bucket_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static TRANSITIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcs_bucket_operator_transitions_total",
            "Total number of executed reconciliation steps by step",
        ),
        &["step"],
    )
    .expect("Failed to create TRANSITIONS_TOTAL metric - this should never happen")
});

static BUCKETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_buckets_created_total",
        "Total number of buckets created in GCS",
    )
    .expect("Failed to create BUCKETS_CREATED_TOTAL metric - this should never happen")
});

static BUCKETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_buckets_deleted_total",
        "Total number of buckets deleted from GCS",
    )
    .expect("Failed to create BUCKETS_DELETED_TOTAL metric - this should never happen")
});

static BINDING_DRIFT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_binding_drift_total",
        "Total number of reconciliations halted because spec.name changed after binding",
    )
    .expect("Failed to create BINDING_DRIFT_TOTAL metric - this should never happen")
});

static OWNERSHIP_VIOLATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcs_bucket_operator_ownership_violations_total",
        "Total number of deletions refused because the bucket is owned by someone else",
    )
    .expect("Failed to create OWNERSHIP_VIOLATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcs_bucket_operator_provider_operations_total",
            "Total number of provider operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcs_bucket_operator_provider_operation_errors_total",
            "Total number of failed provider operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gcs_bucket_operator_provider_operation_duration_seconds",
            "Duration of provider operations in seconds by operation",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRANSITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUCKETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUCKETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BINDING_DRIFT_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OWNERSHIP_VIOLATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_transitions(step: &str) {
    TRANSITIONS_TOTAL.with_label_values(&[step]).inc();
}

pub fn increment_buckets_created() {
    BUCKETS_CREATED_TOTAL.inc();
}

pub fn increment_buckets_deleted() {
    BUCKETS_DELETED_TOTAL.inc();
}

pub fn increment_binding_drift() {
    BINDING_DRIFT_TOTAL.inc();
}

pub fn increment_ownership_violations() {
    OWNERSHIP_VIOLATIONS_TOTAL.inc();
}

pub fn record_provider_operation(operation: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_provider_operation_errors(operation: &str) {
    PROVIDER_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}
