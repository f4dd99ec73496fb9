//! # Remote Bucket Operations
//!
//! The only code that talks to the storage provider. Translates the desired
//! state of a `Bucket` into provider calls and records the outcome on the
//! resource.
//!
//! Ownership is decided by the owner label on the remote bucket. A bucket
//! without our label is never adopted, bound or deleted.

use crate::constants::BUCKET_OWNER_LABEL;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::Bucket;
use crate::observability::events::{actions, reasons};
use crate::observability::metrics;
use crate::provider::{BucketAttrs, NewBucket};
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

/// Result of [`create_or_adopt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The bucket did not exist and was created, then bound
    Created,
    /// The bucket existed with our owner label and was bound
    Adopted,
    /// Owned and already bound; nothing was written
    Converged,
    /// The bucket exists but belongs to someone else; left alone
    NotOwned,
}

/// Result of [`delete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The remote bucket was deleted
    Deleted,
    /// `removeOnDelete` is false; the bucket stays
    Retained,
    /// Nothing to delete
    AlreadyGone,
}

impl CreateOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CreateOutcome::Created => "created",
            CreateOutcome::Adopted => "adopted",
            CreateOutcome::Converged => "converged",
            CreateOutcome::NotOwned => "not-owned",
        }
    }
}

impl DeleteOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteOutcome::Deleted => "deleted",
            DeleteOutcome::Retained => "retained",
            DeleteOutcome::AlreadyGone => "already-gone",
        }
    }
}

fn remote_error(bucket: &Bucket, source: anyhow::Error) -> ReconcilerError {
    ReconcilerError::Remote {
        bucket: bucket.spec.name.clone(),
        source,
    }
}

fn owner_of(attrs: &BucketAttrs) -> Option<String> {
    attrs.labels.get(BUCKET_OWNER_LABEL).cloned()
}

/// Both binding markers already name `spec.name`
fn is_fully_bound(bucket: &Bucket) -> bool {
    let name = bucket.spec.name.as_str();
    bucket.bucket_ref() == Some(name) && bucket.annotated_bucket() == Some(name)
}

/// Ensure the remote bucket exists and is bound to `bucket`
///
/// Persists the binding when it changes. An existing bucket that does not
/// carry this resource's owner label is observed but never touched.
pub async fn create_or_adopt(
    ctx: &Reconciler,
    bucket: &mut Bucket,
) -> Result<CreateOutcome, ReconcilerError> {
    let name = bucket.spec.name.clone();

    let existing = ctx
        .provider
        .get_bucket_attrs(&name)
        .await
        .map_err(|e| remote_error(bucket, e))?;

    match existing {
        Some(attrs) if !bucket.is_owned_by(&attrs.labels) => {
            let owner = owner_of(&attrs);
            warn!(
                bucket = %name,
                owner = ?owner,
                "GCS bucket exists but is not owned by this resource, leaving it untouched"
            );
            ctx.publish_event(
                bucket,
                EventType::Warning,
                reasons::NOT_OWNED,
                actions::RECONCILE,
                format!("GCS bucket {name} exists and is owned by {owner:?}; it will not be adopted"),
            )
            .await;
            Ok(CreateOutcome::NotOwned)
        }
        Some(_) if is_fully_bound(bucket) => {
            debug!(bucket = %name, "GCS bucket is owned and bound");
            Ok(CreateOutcome::Converged)
        }
        Some(_) => {
            bucket.bind_remote();
            ctx.persist(bucket).await?;
            info!(bucket = %name, "Bound existing GCS bucket");
            ctx.publish_event(
                bucket,
                EventType::Normal,
                reasons::BUCKET_BOUND,
                actions::BIND,
                format!("Bound to existing GCS bucket {name}"),
            )
            .await;
            Ok(CreateOutcome::Adopted)
        }
        None => {
            let request = NewBucket {
                name: name.clone(),
                project: bucket.spec.project.clone(),
                location: bucket.spec.location.clone(),
                storage_class: bucket.spec.storage_class.clone(),
                labels: bucket.owner_labels(),
            };
            ctx.provider
                .create_bucket(&request)
                .await
                .map_err(|e| remote_error(bucket, e))?;
            metrics::increment_buckets_created();
            ctx.publish_event(
                bucket,
                EventType::Normal,
                reasons::BUCKET_CREATED,
                actions::CREATE,
                format!(
                    "Created GCS bucket {name} in project {} ({}, {})",
                    request.project, request.location, request.storage_class
                ),
            )
            .await;

            // A failure here leaves an owned, unbound bucket that the next
            // invocation adopts.
            bucket.bind_remote();
            ctx.persist(bucket).await?;
            info!(bucket = %name, project = %request.project, "Created and bound GCS bucket");
            Ok(CreateOutcome::Created)
        }
    }
}

/// Clean up the remote bucket of a resource that is being deleted
///
/// Never deletes a bucket that lacks this resource's owner label. That case is
/// an error so the finalizer stays in place for an operator to look at.
pub async fn delete(ctx: &Reconciler, bucket: &Bucket) -> Result<DeleteOutcome, ReconcilerError> {
    let name = bucket.spec.name.as_str();

    let Some(attrs) = ctx
        .provider
        .get_bucket_attrs(name)
        .await
        .map_err(|e| remote_error(bucket, e))?
    else {
        debug!(bucket = %name, "GCS bucket already gone");
        return Ok(DeleteOutcome::AlreadyGone);
    };

    if !bucket.spec.remove_on_delete {
        info!(bucket = %name, "removeOnDelete is false, keeping GCS bucket");
        ctx.publish_event(
            bucket,
            EventType::Normal,
            reasons::BUCKET_RETAINED,
            actions::DELETE,
            format!("GCS bucket {name} retained (removeOnDelete is false)"),
        )
        .await;
        return Ok(DeleteOutcome::Retained);
    }

    if !bucket.is_owned_by(&attrs.labels) {
        let owner = owner_of(&attrs);
        metrics::increment_ownership_violations();
        ctx.publish_event(
            bucket,
            EventType::Warning,
            reasons::OWNERSHIP_VIOLATION,
            actions::DELETE,
            format!(
                "Refusing to delete GCS bucket {name}: owned by {owner:?}, not {:?}",
                bucket.owner_identity()
            ),
        )
        .await;
        return Err(ReconcilerError::OwnershipViolation {
            bucket: name.to_string(),
            resource: bucket.owner_identity().to_string(),
            owner,
        });
    }

    ctx.provider
        .delete_bucket(name)
        .await
        .map_err(|e| remote_error(bucket, e))?;
    metrics::increment_buckets_deleted();
    info!(bucket = %name, "Deleted GCS bucket");
    ctx.publish_event(
        bucket,
        EventType::Normal,
        reasons::BUCKET_DELETED,
        actions::DELETE,
        format!("Deleted GCS bucket {name}"),
    )
    .await;
    Ok(DeleteOutcome::Deleted)
}
