//! # Kubernetes Events
//!
//! Trait-based wrapper over `kube::runtime::events::Recorder` so that every
//! executed reconciliation step shows up in `kubectl describe bucket`.
//!
//! Events are fire-and-forget: a failed publish is logged as a warning and
//! never fails reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Publishes Kubernetes Events about a Bucket resource
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on `resource_ref`
    ///
    /// * `type_` - Normal or Warning
    /// * `reason` - machine-readable reason, see [`reasons`]
    /// * `action` - what the operator did, see [`actions`]
    /// * `note` - optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production publisher backed by the events.k8s.io API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// The controller name is reported as the event's `reportingComponent`
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`
pub mod reasons {
    /// Finalizer added to a live resource
    pub const FINALIZER_ADDED: &str = "FinalizerAdded";
    /// Finalizer removed after cleanup
    pub const FINALIZER_REMOVED: &str = "FinalizerRemoved";
    /// Remote bucket created
    pub const BUCKET_CREATED: &str = "BucketCreated";
    /// Status and annotation now reference the remote bucket
    pub const BUCKET_BOUND: &str = "BucketBound";
    /// Remote bucket deleted
    pub const BUCKET_DELETED: &str = "BucketDeleted";
    /// Remote bucket left in place on resource deletion
    pub const BUCKET_RETAINED: &str = "BucketRetained";
    /// spec.name no longer matches the bound bucket
    pub const BINDING_DRIFT: &str = "BindingDrift";
    /// Remote bucket exists but carries a different owner label
    pub const NOT_OWNED: &str = "BucketNotOwned";
    /// Deletion refused because the bucket belongs to someone else
    pub const OWNERSHIP_VIOLATION: &str = "OwnershipViolation";
    /// A reconciliation step failed
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
}

/// Event actions, shown in the ACTION column of `kubectl get events`
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const CREATE: &str = "Create";
    pub const BIND: &str = "Bind";
    pub const DELETE: &str = "Delete";
    pub const FINALIZE: &str = "Finalize";
}
