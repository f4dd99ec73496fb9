//! Shared helpers for the GCS client: resource paths and per-call tracking.

use crate::observability::metrics;
use std::time::{Duration, Instant};
use tracing::Span;

/// Path of a bucket resource relative to the JSON API root
pub fn format_bucket_path(bucket_name: &str) -> String {
    format!("storage/v1/b/{bucket_name}")
}

/// Path used to insert a bucket into `project_id`
pub fn format_insert_path(project_id: &str) -> String {
    format!("storage/v1/b?project={project_id}")
}

/// Normalise `STORAGE_EMULATOR_HOST`, which may be given with or without a scheme
pub fn emulator_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Records span attributes and metrics for a single provider call
pub struct OperationTracker {
    start: Instant,
    span: Span,
    operation: &'static str,
}

impl std::fmt::Debug for OperationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationTracker")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl OperationTracker {
    pub fn new(span: Span, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            span,
            operation,
        }
    }

    pub fn record_success(&self) {
        let elapsed = self.start.elapsed();
        self.record_duration(elapsed);
        self.span.record("operation.success", true);
        metrics::record_provider_operation(self.operation, elapsed.as_secs_f64());
    }

    /// A 404 is a normal outcome for lookups and deletes
    pub fn record_not_found(&self) {
        self.span.record("operation.found", false);
        self.record_success();
    }

    pub fn record_error(&self, error_message: &str) {
        let elapsed = self.start.elapsed();
        self.record_duration(elapsed);
        self.span.record("operation.success", false);
        self.span.record("error.message", error_message);
        metrics::record_provider_operation(self.operation, elapsed.as_secs_f64());
        metrics::increment_provider_operation_errors(self.operation);
    }

    fn record_duration(&self, elapsed: Duration) {
        self.span.record(
            "operation.duration_ms",
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_paths() {
        assert_eq!(format_bucket_path("logs-eu"), "storage/v1/b/logs-eu");
        assert_eq!(
            format_insert_path("acme-prod"),
            "storage/v1/b?project=acme-prod"
        );
    }

    #[test]
    fn test_emulator_base_url() {
        assert_eq!(emulator_base_url("localhost:4443"), "http://localhost:4443");
        assert_eq!(
            emulator_base_url("http://fake-gcs:4443/"),
            "http://fake-gcs:4443"
        );
        assert_eq!(emulator_base_url("https://gcs.test"), "https://gcs.test");
    }
}
