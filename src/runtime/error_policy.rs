//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError, ResourceKey};
use crate::crd::Bucket;
use crate::observability;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing `Bucket` does not
/// slow down retries of the others. The state is cleared by the next
/// successful reconciliation of the same resource.
pub fn handle_reconciliation_error(
    obj: Arc<Bucket>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ResourceKey::from_bucket(&obj);

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        error.kind = error.kind(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = ctx.next_error_backoff(&key);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, next attempt at {})",
        key,
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Classification of an error raised by the watch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or the service account token expired
    Unauthorized,
    /// Resource version too old, normal after API server restarts
    Expired,
    /// API server storage reinitialising or throttling
    TooManyRequests,
    /// Object or CRD missing
    NotFound,
    Other,
}

/// Classify a watch error by its debug representation
///
/// 404 is checked before 401 because a plain-text 404 body surfaces as a
/// deserialisation error that also mentions `WatchFailed`.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        WatchErrorKind::Unauthorized
    } else if is_410 {
        WatchErrorKind::Expired
    } else if is_429 {
        WatchErrorKind::TooManyRequests
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// What the watch loop does after an error item from the controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorAction {
    /// Keep polling the stream; the watcher recovers on its own
    Continue,
    /// Drop the controller and start a new one after the delay
    Restart(Duration),
}

/// Error item yielded by `Controller::run`
pub type ControllerError = controller::Error<ReconcilerError, watcher::Error>;

/// Decide how to react to an error item from the controller stream
///
/// Failed reconciliations are already requeued by
/// [`handle_reconciliation_error`], so they only get a debug line here. Only
/// watcher and queue failures are classified. Nothing in here sleeps: the
/// stream must keep being polled so that other resources keep reconciling.
pub fn handle_controller_error(
    error: &ControllerError,
    backoff_ms: &mut u64,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> WatchErrorAction {
    match error {
        controller::Error::ReconcilerFailed(err, obj) => {
            debug!(
                resource = %obj,
                error.kind = err.kind(),
                "Reconciliation failed, retry scheduled by the error policy"
            );
            WatchErrorAction::Continue
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!(resource = %obj, "Bucket no longer in the cache, skipping");
            WatchErrorAction::Continue
        }
        other => handle_watch_stream_error(
            &format!("{other:?}"),
            backoff_ms,
            max_backoff_ms,
            watch_restart_delay_secs,
        ),
    }
}

/// Classify a watcher or queue error and pick the recovery
pub fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &mut u64,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> WatchErrorAction {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!(
                "Verify the operator ClusterRole still grants list/watch/update on buckets.{}",
                crate::constants::API_GROUP
            );
            warn!(
                "Restarting watch in {}s (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            WatchErrorAction::Restart(Duration::from_secs(watch_restart_delay_secs))
        }
        WatchErrorKind::Expired => {
            warn!(
                "Watch resource version expired (410) - this is normal during API server restarts, the watcher relists"
            );
            WatchErrorAction::Continue
        }
        WatchErrorKind::TooManyRequests => {
            let current_backoff = *backoff_ms;
            warn!(
                "API server storage reinitializing (429), restarting watch in {}ms...",
                current_backoff
            );
            *backoff_ms = current_backoff.saturating_mul(2).min(max_backoff_ms);
            WatchErrorAction::Restart(Duration::from_millis(current_backoff))
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - check that the Bucket CRD is installed. Error: {}",
                error_string
            );
            WatchErrorAction::Continue
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            WatchErrorAction::Restart(Duration::from_secs(watch_restart_delay_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_runtime::reflector::ObjectRef;

    #[test]
    fn test_classify_watch_errors() {
        assert_eq!(
            classify_watch_error("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("too old resource version: 12 (34)"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::TooManyRequests
        );
        assert_eq!(
            classify_watch_error("WatchFailed: invalid type: integer `404`"),
            WatchErrorKind::NotFound
        );
        assert_eq!(
            classify_watch_error("connection reset by peer"),
            WatchErrorKind::Other
        );
    }

    #[test]
    fn test_not_found_wins_over_unauthorized() {
        assert_eq!(
            classify_watch_error("WatchFailed 401 ObjectNotFound"),
            WatchErrorKind::NotFound
        );
    }

    #[test]
    fn test_too_many_requests_doubles_backoff_up_to_max() {
        let mut backoff_ms = 1000;

        let action = handle_watch_stream_error("429 TooManyRequests", &mut backoff_ms, 3000, 5);
        assert_eq!(action, WatchErrorAction::Restart(Duration::from_millis(1000)));
        assert_eq!(backoff_ms, 2000);

        handle_watch_stream_error("429 TooManyRequests", &mut backoff_ms, 3000, 5);
        assert_eq!(backoff_ms, 3000);
    }

    #[test]
    fn test_expired_watch_keeps_polling() {
        let mut backoff_ms = 1000;
        let action =
            handle_watch_stream_error("too old resource version: 12 (34)", &mut backoff_ms, 30_000, 5);
        assert_eq!(action, WatchErrorAction::Continue);
        assert_eq!(backoff_ms, 1000);
    }

    fn failed(err: ReconcilerError) -> ControllerError {
        controller::Error::ReconcilerFailed(err, ObjectRef::<Bucket>::new("b1").within("default").erase())
    }

    #[test]
    fn test_reconcile_failures_never_stall_the_stream() {
        let errors = [
            failed(ReconcilerError::OwnershipViolation {
                bucket: "b1".to_string(),
                resource: "b1".to_string(),
                owner: Some("other".to_string()),
            }),
            failed(ReconcilerError::Remote {
                bucket: "b1".to_string(),
                source: anyhow::anyhow!("GCS API error: Invalid Credentials (code: 401)"),
            }),
            failed(ReconcilerError::Remote {
                bucket: "b1".to_string(),
                source: anyhow::anyhow!("GCS API error: rate limited (code: 429)"),
            }),
        ];

        for error in &errors {
            let mut backoff_ms = 1000;
            assert_eq!(
                handle_controller_error(error, &mut backoff_ms, 30_000, 5),
                WatchErrorAction::Continue,
                "{error:?}"
            );
            assert_eq!(backoff_ms, 1000);
        }
    }

    #[test]
    fn test_missing_object_is_skipped() {
        let mut backoff_ms = 1000;
        let error: ControllerError = controller::Error::ObjectNotFound(
            ObjectRef::<Bucket>::new("b1").within("default").erase(),
        );
        assert_eq!(
            handle_controller_error(&error, &mut backoff_ms, 30_000, 5),
            WatchErrorAction::Continue
        );
    }
}
