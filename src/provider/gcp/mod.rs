//! # Google Cloud Storage
//!
//! [`GcsREST`] implements [`crate::provider::BucketProvider`] against the
//! Cloud Storage JSON API, or a local emulator when `STORAGE_EMULATOR_HOST` is set.

pub mod client;

pub use client::{GcsAuth, GcsREST};
