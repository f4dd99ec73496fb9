//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Marker names written onto Kubernetes objects and remote buckets live here so
//! that the resource model, the reconciler and the tests agree on them. The
//! remaining values are defaults that can be overridden through environment
//! variables (see [`crate::config`]).

/// API group of the `Bucket` custom resource
pub const API_GROUP: &str = "storage.bucket-operator.dev";

/// Field manager / reporting component name used on the Kubernetes API
pub const CONTROLLER_NAME: &str = "gcs-bucket-operator";

/// Finalizer that blocks hard deletion of a `Bucket` until remote cleanup ran
pub const BUCKET_FINALIZER: &str = "bucket.storage.bucket-operator.dev/finalizer";

/// Label written onto remote buckets recording which resource created them.
///
/// GCS label keys only allow lowercase letters, digits, `_` and `-`, so this
/// cannot reuse the API group notation.
pub const BUCKET_OWNER_LABEL: &str = "bucket-operator-owner";

/// Annotation recording the bucket name the resource was bound to.
///
/// Resources reconciled by early operator releases carry only this marker and
/// no status binding, so it still takes part in drift detection.
pub const BUCKET_ANNOTATION: &str = "storage.bucket-operator.dev/bucket";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval when the backoff state cannot be read (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff floor for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff ceiling for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default periodic re-verification interval for converged buckets (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Delay before the follow-up invocation after a finalizer was attached (seconds)
pub const FOLLOW_UP_REQUEUE_SECS: u64 = 1;

/// Default maximum number of reconciliations running at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default delay before restarting the watch stream after it ends or fails (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Production endpoint of the GCS JSON API
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// GCE/GKE metadata server token endpoint (Workload Identity)
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh cached access tokens this many seconds before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Initial backoff after the watch stream reports throttling (milliseconds)
pub const WATCH_BACKOFF_START_MS: u64 = 1000;

/// Maximum backoff after repeated watch stream throttling (milliseconds)
pub const WATCH_BACKOFF_MAX_MS: u64 = 30_000;
