//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::store::BucketStore;
use crate::crd::Bucket;
use crate::observability::events::EventPublisher;
use crate::provider::BucketProvider;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The resource could not be read from the API server
    #[error("Failed to load Bucket {key}: {source:#}")]
    Load {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A mutation of the resource could not be persisted
    #[error("Failed to persist Bucket {key}: {source:#}")]
    Persist {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The storage provider failed with something other than "not found"
    #[error("GCS operation on bucket {bucket} failed: {source:#}")]
    Remote {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    /// Deletion was requested for a bucket this resource did not create
    #[error(
        "Refusing to delete GCS bucket {bucket}: owner label is {owner:?}, expected {resource:?}"
    )]
    OwnershipViolation {
        bucket: String,
        resource: String,
        owner: Option<String>,
    },
}

impl ReconcilerError {
    /// Short label for metrics and events
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Load { .. } => "load",
            ReconcilerError::Persist { .. } => "persist",
            ReconcilerError::Remote { .. } => "remote",
            ReconcilerError::OwnershipViolation { .. } => "ownership-violation",
        }
    }
}

/// Namespace and name of a `Bucket` resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object delivered by the watch
    #[must_use]
    pub fn from_bucket(bucket: &Bucket) -> Self {
        Self::new(
            bucket.metadata.namespace.as_deref().unwrap_or("default"),
            bucket.metadata.name.as_deref().unwrap_or_default(),
        )
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciliation context
///
/// Every collaborator is injected at construction so tests can swap in
/// in-memory fakes for the API server, GCS and the event recorder.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn BucketStore>,
    pub provider: Arc<dyn BucketProvider>,
    pub events: Arc<dyn EventPublisher>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn BucketStore>,
        provider: Arc<dyn BucketProvider>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            events,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after a successful reconciliation
    pub fn reset_backoff(&self, key: &ResourceKey) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(&key.to_string());
            }
            Err(e) => {
                tracing::warn!("Failed to lock backoff_states: {}", e);
            }
        }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_error_backoff(&self, key: &ResourceKey) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
                });
                state.increment_error();
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to lock backoff_states: {}, using default backoff",
                    e
                );
                (self.config.reconciliation_error_requeue_secs, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_display() {
        assert_eq!(ResourceKey::new("media", "assets").to_string(), "media/assets");
    }

    #[test]
    fn test_ownership_violation_message() {
        let err = ReconcilerError::OwnershipViolation {
            bucket: "b1".to_string(),
            resource: "b1".to_string(),
            owner: Some("other".to_string()),
        };
        assert_eq!(
            err.to_string(),
            r#"Refusing to delete GCS bucket b1: owner label is Some("other"), expected "b1""#
        );
        assert_eq!(err.kind(), "ownership-violation");
    }

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(5, 300);
        state.increment_error();
        state.increment_error();
        state.backoff.next_backoff_seconds();
        state.backoff.next_backoff_seconds();
        state.backoff.next_backoff_seconds();

        state.reset();

        assert_eq!(state.error_count, 0);
        assert_eq!(state.backoff.next_backoff_seconds(), 5);
    }
}
