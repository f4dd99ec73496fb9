//! # Bucket Store
//!
//! Read and persist `Bucket` resources.
//!
//! Metadata (finalizers, annotations) is written with a full `replace`, so a
//! stale `resourceVersion` fails with a conflict instead of overwriting a
//! concurrent edit. The status subresource is merge-patched afterwards, and
//! only when it actually changed.

use crate::controller::reconciler::types::ResourceKey;
use crate::crd::Bucket;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::debug;

#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Returns `Ok(None)` when the resource does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<Bucket>>;

    /// Persist metadata and status, returning the stored object
    async fn update(&self, bucket: &Bucket) -> Result<Bucket>;
}

/// [`BucketStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeBucketStore {
    client: Client,
}

impl std::fmt::Debug for KubeBucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeBucketStore").finish_non_exhaustive()
    }
}

impl KubeBucketStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Bucket> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BucketStore for KubeBucketStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Bucket>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .with_context(|| format!("Failed to get Bucket {key}"))
    }

    async fn update(&self, bucket: &Bucket) -> Result<Bucket> {
        let key = ResourceKey::from_bucket(bucket);
        let api = self.api(&key.namespace);

        let stored = api
            .replace(&key.name, &PostParams::default(), bucket)
            .await
            .with_context(|| format!("Failed to replace Bucket {key}"))?;

        if stored.status == bucket.status {
            return Ok(stored);
        }

        debug!(resource = %key, "Patching Bucket status");
        let patch = json!({ "status": bucket.status });
        api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| format!("Failed to patch status of Bucket {key}"))
    }
}
