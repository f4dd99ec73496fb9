//! # Resource Model
//!
//! Pure predicates and mutators over a [`Bucket`] resource.
//!
//! Nothing in here performs I/O. Every mutation is applied in memory and must
//! be persisted explicitly by the caller through a
//! [`BucketStore`](crate::controller::reconciler::BucketStore).

use crate::constants::{BUCKET_ANNOTATION, BUCKET_OWNER_LABEL};
use crate::crd::{Bucket, BucketStatus};
use std::collections::BTreeMap;

impl Bucket {
    /// True once the API server has set a deletion timestamp
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
    }

    /// Add a finalizer; a no-op when it is already present
    pub fn add_finalizer(&mut self, finalizer: &str) {
        if self.has_finalizer(finalizer) {
            return;
        }
        self.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
    }

    /// Remove a finalizer; a no-op when it is absent
    pub fn remove_finalizer(&mut self, finalizer: &str) {
        if let Some(finalizers) = self.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != finalizer);
        }
    }

    /// Identity recorded in the ownership label of buckets this resource creates
    #[must_use]
    pub fn owner_identity(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Bucket this resource is bound to, if any
    #[must_use]
    pub fn bucket_ref(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.gcs_bucket_ref.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// Bucket recorded in the legacy bucket annotation, if any
    #[must_use]
    pub fn annotated_bucket(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(BUCKET_ANNOTATION))
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// True when unbound, or bound to the bucket in `spec.name`
    ///
    /// A binding to any other bucket is a forbidden state: the binding is
    /// immutable and reconciliation must not try to move it.
    #[must_use]
    pub fn is_remote_ref_valid(&self) -> bool {
        self.bucket_ref().is_none_or(|r| r == self.spec.name)
    }

    /// Same check as [`Bucket::is_remote_ref_valid`] against the bucket annotation
    #[must_use]
    pub fn is_legacy_binding_valid(&self) -> bool {
        self.annotated_bucket().is_none_or(|b| b == self.spec.name)
    }

    /// The spec name changed after a remote binding was established
    #[must_use]
    pub fn has_binding_drift(&self) -> bool {
        !self.is_remote_ref_valid() || !self.is_legacy_binding_valid()
    }

    /// True when the remote labels carry this resource's ownership label
    #[must_use]
    pub fn is_owned_by(&self, remote_labels: &BTreeMap<String, String>) -> bool {
        match remote_labels.get(BUCKET_OWNER_LABEL) {
            Some(owner) => !owner.is_empty() && owner == self.owner_identity(),
            None => false,
        }
    }

    /// Labels written onto buckets created for this resource
    #[must_use]
    pub fn owner_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            BUCKET_OWNER_LABEL.to_string(),
            self.owner_identity().to_string(),
        )])
    }

    /// Bind the resource to the bucket in `spec.name`
    ///
    /// Returns `false` without touching anything when the resource is already
    /// bound elsewhere. Returns `true` when the binding was recorded, including
    /// when it was already in place.
    pub fn bind_remote(&mut self) -> bool {
        if self.has_binding_drift() {
            return false;
        }

        let name = self.spec.name.clone();
        self.status
            .get_or_insert_with(BucketStatus::default)
            .gcs_bucket_ref = Some(name.clone());
        self.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(BUCKET_ANNOTATION.to_string(), name);
        true
    }
}
