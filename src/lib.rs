//! GCS Bucket Operator Library
//!
//! Reconciles `Bucket` custom resources into Google Cloud Storage buckets.
//!
//! ## Quick Start
//!
//! ```rust
//! use gcs_bucket_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
