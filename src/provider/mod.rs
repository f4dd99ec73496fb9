//! # Provider Modules
//!
//! Access to the object-storage provider that owns the remote buckets.
//!
//! The reconciler only talks to the provider through [`BucketProvider`], which
//! keeps the state machine testable with an in-memory fake and leaves
//! authentication and transport to the implementation.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod gcp;

/// Observed attributes of a remote bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketAttrs {
    pub name: String,
    pub location: Option<String>,
    pub storage_class: Option<String>,
    pub labels: BTreeMap<String, String>,
}

/// Everything needed to create a remote bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBucket {
    pub name: String,
    pub project: String,
    pub location: String,
    pub storage_class: String,
    pub labels: BTreeMap<String, String>,
}

/// Provider trait for object-storage buckets
#[async_trait]
pub trait BucketProvider: Send + Sync {
    /// Fetch bucket attributes
    /// Returns `Ok(None)` when the bucket does not exist
    async fn get_bucket_attrs(&self, name: &str) -> Result<Option<BucketAttrs>>;

    /// Create a bucket with the given attributes and labels
    async fn create_bucket(&self, bucket: &NewBucket) -> Result<()>;

    /// Delete an (empty) bucket
    async fn delete_bucket(&self, name: &str) -> Result<()>;
}
