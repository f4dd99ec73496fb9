//! # Reconcile
//!
//! Drives one `Bucket` a single step towards convergence per invocation.
//!
//! Stages run in a fixed order: load, deletion, finalizer attach, drift guard,
//! create-or-adopt. A stage that persists a mutation ends the invocation, so a
//! crash at any point leaves a state the next invocation resumes from.

use crate::constants::{BUCKET_FINALIZER, FOLLOW_UP_REQUEUE_SECS};
use crate::controller::reconciler::remote::{self, CreateOutcome, DeleteOutcome};
use crate::controller::reconciler::state::BucketState;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, ResourceKey};
use crate::crd::Bucket;
use crate::observability::events::{actions, reasons};
use crate::observability::metrics;
use kube::Resource;
use kube::runtime::events::EventType;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// The transition executed by one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to do in the observed state
    None,
    FinalizerAdded,
    /// Remote cleanup finished and the finalizer was removed
    FinalizerRemoved(DeleteOutcome),
    CreateOrAdopt(CreateOutcome),
}

impl Step {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::None => "none",
            Step::FinalizerAdded => "finalizer-added",
            Step::FinalizerRemoved(_) => "finalizer-removed",
            Step::CreateOrAdopt(outcome) => outcome.as_str(),
        }
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub state: BucketState,
    pub step: Step,
    /// Run again right away to continue with the next stage
    pub requeue: bool,
}

impl ReconcileOutcome {
    fn new(state: BucketState, step: Step) -> Self {
        Self {
            state,
            step,
            requeue: false,
        }
    }

    /// Map the outcome onto a controller action
    ///
    /// Converged resources are re-verified every `resync_interval` so that
    /// buckets removed or relabelled outside the cluster are noticed.
    #[must_use]
    pub fn action(&self, resync_interval: Duration) -> Action {
        if self.requeue {
            metrics::increment_requeues_total("follow-up");
            return Action::requeue(Duration::from_secs(FOLLOW_UP_REQUEUE_SECS));
        }
        match self.state {
            BucketState::Gone
            | BucketState::Released
            | BucketState::AwaitingDelete
            | BucketState::Drifted => Action::await_change(),
            BucketState::Unmanaged | BucketState::FinalizerAttached | BucketState::Bound => {
                metrics::increment_requeues_total("resync");
                Action::requeue(resync_interval)
            }
        }
    }
}

impl Reconciler {
    /// Write `bucket` back; any failure fails the whole stage
    pub(super) async fn persist(&self, bucket: &Bucket) -> Result<(), ReconcilerError> {
        self.store
            .update(bucket)
            .await
            .map(|_| ())
            .map_err(|source| ReconcilerError::Persist {
                key: ResourceKey::from_bucket(bucket).to_string(),
                source,
            })
    }

    pub(super) async fn publish_event(
        &self,
        bucket: &Bucket,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        self.events
            .publish(&bucket.object_ref(&()), type_, reason, action, Some(note))
            .await;
    }
}

/// Run exactly one transition for the resource stored under `key`
///
/// # Errors
/// Store and provider failures are returned unchanged for retry, as is an
/// attempt to delete a bucket this resource does not own. Forbidden drift and
/// missing remote buckets are not errors.
pub async fn reconcile_key(
    ctx: &Reconciler,
    key: &ResourceKey,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let loaded = ctx
        .store
        .get(key)
        .await
        .map_err(|source| ReconcilerError::Load {
            key: key.to_string(),
            source,
        })?;

    let state = BucketState::observe(loaded.as_ref());
    let Some(mut bucket) = loaded else {
        debug!(resource = %key, "Bucket not found, nothing to do");
        return Ok(ReconcileOutcome::new(state, Step::None));
    };
    debug!(resource = %key, state = %state, "Observed Bucket state");

    let step = match state {
        BucketState::Gone | BucketState::Released => Step::None,

        BucketState::AwaitingDelete => {
            let outcome = remote::delete(ctx, &bucket).await?;
            bucket.remove_finalizer(BUCKET_FINALIZER);
            ctx.persist(&bucket).await?;
            info!(resource = %key, outcome = outcome.as_str(), "Finalizer removed");
            ctx.publish_event(
                &bucket,
                EventType::Normal,
                reasons::FINALIZER_REMOVED,
                actions::FINALIZE,
                format!("Cleanup finished ({}), finalizer removed", outcome.as_str()),
            )
            .await;
            Step::FinalizerRemoved(outcome)
        }

        BucketState::Unmanaged => {
            bucket.add_finalizer(BUCKET_FINALIZER);
            ctx.persist(&bucket).await?;
            info!(resource = %key, "Finalizer added");
            ctx.publish_event(
                &bucket,
                EventType::Normal,
                reasons::FINALIZER_ADDED,
                actions::FINALIZE,
                format!("Added finalizer {BUCKET_FINALIZER}"),
            )
            .await;
            metrics::increment_transitions(Step::FinalizerAdded.as_str());
            return Ok(ReconcileOutcome {
                state,
                step: Step::FinalizerAdded,
                requeue: true,
            });
        }

        BucketState::Drifted => {
            let bound = bucket
                .bucket_ref()
                .or(bucket.annotated_bucket())
                .unwrap_or_default()
                .to_string();
            warn!(
                resource = %key,
                bound = %bound,
                requested = %bucket.spec.name,
                "spec.name changed after the bucket was bound, refusing to reconcile"
            );
            metrics::increment_binding_drift();
            ctx.publish_event(
                &bucket,
                EventType::Warning,
                reasons::BINDING_DRIFT,
                actions::RECONCILE,
                format!(
                    "Bound to GCS bucket {bound} but spec.name is {}; the binding cannot be changed",
                    bucket.spec.name
                ),
            )
            .await;
            Step::None
        }

        BucketState::FinalizerAttached | BucketState::Bound => {
            Step::CreateOrAdopt(remote::create_or_adopt(ctx, &mut bucket).await?)
        }
    };

    metrics::increment_transitions(step.as_str());
    Ok(ReconcileOutcome::new(state, step))
}

/// kube-runtime entrypoint
///
/// # Errors
/// Returns the [`ReconcilerError`] of the failed stage; the error policy turns
/// it into a backoff requeue.
pub async fn reconcile(
    obj: Arc<Bucket>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ResourceKey::from_bucket(&obj);
    let span = info_span!(
        "controller.reconcile",
        resource.namespace = %key.namespace,
        resource.name = %key.name,
        bucket.name = %obj.spec.name,
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let result = reconcile_key(&ctx, &key).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                ctx.reset_backoff(&key);
                debug!(
                    state = %outcome.state,
                    step = outcome.step.as_str(),
                    requeue = outcome.requeue,
                    "Reconciliation finished"
                );
                Ok(outcome.action(ctx.config.resync_interval()))
            }
            Err(err) => {
                // Ownership violations already carry their own event
                if !matches!(err, ReconcilerError::OwnershipViolation { .. }) {
                    ctx.publish_event(
                        &obj,
                        EventType::Warning,
                        reasons::RECONCILE_FAILED,
                        actions::RECONCILE,
                        err.to_string(),
                    )
                    .await;
                }
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}
