//! # Reconciler
//!
//! Core reconciliation logic for `Bucket` resources.
//!
//! The reconciler:
//! - Keeps a finalizer on every live `Bucket` so cleanup runs before removal
//! - Creates the GCS bucket named by `spec.name`, or binds one it created earlier
//! - Refuses to move an established binding to a different bucket name
//! - Deletes the GCS bucket on resource deletion when asked to and when it owns it
//!
//! ## Reconciliation Flow
//!
//! 1. Load the resource
//! 2. Deleting: clean up remotely, then drop the finalizer
//! 3. No finalizer: add it and requeue
//! 4. Binding drift: warn and stop
//! 5. Create or adopt the remote bucket and record the binding

pub mod reconcile;
pub mod remote;
pub mod state;
pub mod store;
pub mod types;

// Re-export public API
pub use reconcile::{reconcile, reconcile_key, ReconcileOutcome, Step};
pub use remote::{CreateOutcome, DeleteOutcome};
pub use state::BucketState;
pub use store::{BucketStore, KubeBucketStore};
pub use types::{BackoffState, Reconciler, ReconcilerError, ResourceKey};
