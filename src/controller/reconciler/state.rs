//! # Observed State
//!
//! Classifies a loaded resource into exactly one lifecycle state. The
//! reconciler executes the single transition that belongs to that state and
//! then stops; the persisted mutation triggers the next invocation.
//!
//! ```text
//! Unmanaged -> FinalizerAttached -> Bound
//!                    |                |
//!                    +-> AwaitingDelete <-+-> Released -> Gone
//! ```

use crate::constants::BUCKET_FINALIZER;
use crate::crd::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// The resource no longer exists
    Gone,
    /// Deletion requested and cleanup already finished
    Released,
    /// Deletion requested, remote cleanup still pending
    AwaitingDelete,
    /// Live resource without the finalizer
    Unmanaged,
    /// `spec.name` differs from the established binding
    Drifted,
    /// Finalizer present but no remote bucket bound yet
    FinalizerAttached,
    /// Finalizer present and bound to `spec.name`
    Bound,
}

impl BucketState {
    /// Evaluated in a fixed order: deletion, finalizer, drift, binding
    #[must_use]
    pub fn observe(bucket: Option<&Bucket>) -> Self {
        let Some(bucket) = bucket else {
            return BucketState::Gone;
        };

        if bucket.is_being_deleted() {
            return if bucket.has_finalizer(BUCKET_FINALIZER) {
                BucketState::AwaitingDelete
            } else {
                BucketState::Released
            };
        }

        if !bucket.has_finalizer(BUCKET_FINALIZER) {
            return BucketState::Unmanaged;
        }

        if bucket.has_binding_drift() {
            return BucketState::Drifted;
        }

        if bucket.bucket_ref() == Some(bucket.spec.name.as_str()) {
            BucketState::Bound
        } else {
            BucketState::FinalizerAttached
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketState::Gone => "gone",
            BucketState::Released => "released",
            BucketState::AwaitingDelete => "awaiting-delete",
            BucketState::Unmanaged => "unmanaged",
            BucketState::Drifted => "drifted",
            BucketState::FinalizerAttached => "finalizer-attached",
            BucketState::Bound => "bound",
        }
    }
}

impl std::fmt::Display for BucketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
