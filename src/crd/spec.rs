//! # Bucket Spec
//!
//! Main CRD specification type.

use serde::{Deserialize, Serialize};

/// Bucket Custom Resource Definition
///
/// Describes a Google Cloud Storage bucket whose lifecycle is managed by the
/// operator. The spec fields are the desired identity of the remote bucket and
/// are expected to stay unchanged once the bucket has been bound.
///
/// # Example
///
/// ```yaml
/// apiVersion: storage.bucket-operator.dev/v1alpha1
/// kind: Bucket
/// metadata:
///   name: media-assets
///   namespace: default
/// spec:
///   name: acme-media-assets
///   project: acme-prod
///   location: EU
///   storageClass: STANDARD
///   removeOnDelete: false
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Bucket",
    group = "storage.bucket-operator.dev",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::BucketStatus",
    shortname = "bk",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.name"}, {"name":"Location", "type":"string", "jsonPath":".spec.location"}, {"name":"Bound", "type":"string", "jsonPath":".status.gcsBucketRef"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    /// Name of the GCS bucket (globally unique across GCS)
    pub name: String,
    /// GCP project the bucket is created in
    pub project: String,
    /// Bucket location, e.g. "US", "EU" or "europe-west1"
    /// See https://cloud.google.com/storage/docs/locations
    pub location: String,
    /// Storage class, e.g. "STANDARD", "NEARLINE", "COLDLINE", "ARCHIVE"
    /// See https://cloud.google.com/storage/docs/storage-classes
    pub storage_class: String,
    /// Delete the GCS bucket together with the resource
    /// Only buckets created by this resource are ever deleted
    /// Default: false (bucket is kept)
    #[serde(default)]
    pub remove_on_delete: bool,
}
