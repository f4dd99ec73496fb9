//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use gcs_bucket_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Seams of the reconciler, implemented by the GCS client, the Kubernetes
// store and the event recorder (or by fakes in tests)
pub use crate::controller::reconciler::BucketStore;
pub use crate::observability::events::EventPublisher;
pub use crate::provider::{BucketAttrs, BucketProvider, NewBucket};

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_key, BackoffState, BucketState, ReconcileOutcome, Reconciler,
    ReconcilerError, ResourceKey,
};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};

pub use crate::provider::gcp::GcsREST;
