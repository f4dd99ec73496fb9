//! # Custom Resource Definitions
//!
//! CRD types for the GCS Bucket Operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Bucket` CRD specification
//! - `status.rs` - Observed binding to the remote bucket
//! - `model.rs` - Pure predicates and mutators (finalizers, binding, ownership)

mod model;
mod spec;
mod status;

pub use spec::{Bucket, BucketSpec};
pub use status::BucketStatus;
