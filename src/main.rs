//! # GCS Bucket Operator
//!
//! Kubernetes operator that creates, binds and deletes Google Cloud Storage
//! buckets described by `Bucket` custom resources.
//!
//! ## Overview
//!
//! 1. Adds a finalizer to every `Bucket` so cleanup runs before removal
//! 2. Creates the GCS bucket with an owner label, or binds one it created before
//! 3. Records the binding in `status.gcsBucketRef` and refuses to move it later
//! 4. On deletion, removes the bucket if `removeOnDelete` is set and it owns it

use anyhow::Result;
use gcs_bucket_operator::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.buckets,
        init_result.reconciler,
        init_result.server_state,
    )
    .await
}
