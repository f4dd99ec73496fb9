//! # Bucket Status
//!
//! Observed state of a `Bucket` resource.

use serde::{Deserialize, Serialize};

/// Status of the Bucket resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketStatus {
    /// Name of the GCS bucket this resource is bound to
    /// Set once the bucket has been created or adopted, never changed afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_bucket_ref: Option<String>,
}
